//! HTTP implementation of the submission gateway.
//!
//! JSON bodies by default; an emergency report with a photo goes out as
//! multipart form data (one text part per field plus a `foto` file part).

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::SubmissionGateway;
use super::model::{
    AccountQuery, AccountRecord, Comparison, EmergencyAck, EmergencyReport, ImageAttachment,
    QuestionContext,
};
use crate::config::GatewayConfig;
use crate::error::{ConfigError, FieldError, SubmissionError};

/// Longest error body kept in `SubmissionError::Status`.
const MAX_ERROR_BODY: usize = 500;

/// Gateway that POSTs to the cooperative's REST backend.
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "http_client".into(),
                message: e.to_string(),
            })?;
        Ok(Self { config, client })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, SubmissionError> {
        let resp = request.send().await.map_err(|e| SubmissionError::Transport {
            operation: operation.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| SubmissionError::Transport {
            operation: operation.to_string(),
            reason: format!("failed reading body: {e}"),
        })?;

        if status.is_success() {
            return Ok(body);
        }

        if matches!(
            status,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let field_errors = parse_field_errors(&body);
            if !field_errors.is_empty() {
                return Err(SubmissionError::Rejected {
                    operation: operation.to_string(),
                    field_errors,
                });
            }
        }

        Err(SubmissionError::Status {
            operation: operation.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }
}

/// Decode a success body, mapping failures to `MalformedResponse`.
fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T, SubmissionError> {
    serde_json::from_str(body).map_err(|e| SubmissionError::MalformedResponse {
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

/// Account lookups come back as a list, a single object, or a paginated
/// envelope (`results` / `boletas`).
fn decode_records(operation: &str, body: &str) -> Result<Vec<AccountRecord>, SubmissionError> {
    let value: Value = decode(operation, body)?;
    let malformed = |reason: String| SubmissionError::MalformedResponse {
        operation: operation.to_string(),
        reason,
    };
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            match obj.remove("results").or_else(|| obj.remove("boletas")) {
                Some(Value::Array(items)) => items,
                Some(other) => return Err(malformed(format!("expected a list, got {other}"))),
                None => vec![Value::Object(obj)],
            }
        }
        other => return Err(malformed(format!("unexpected body {other}"))),
    };
    list.into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| malformed(e.to_string())))
        .collect()
}

/// Pull field-level messages out of a DRF-style error body:
/// `{"telefono": ["msg"], "detail": "msg", "non_field_errors": ["msg"]}`.
pub fn parse_field_errors(body: &str) -> Vec<FieldError> {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let mut errors = Vec::new();
    for (key, value) in obj {
        let field = match key.as_str() {
            "detail" | "non_field_errors" | "error" => None,
            _ => Some(key.clone()),
        };
        let messages: Vec<String> = match value {
            Value::String(s) => vec![s],
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Value::Null => continue,
            other => vec![other.to_string()],
        };
        errors.extend(messages.into_iter().map(|message| FieldError {
            field: field.clone(),
            message,
        }));
    }
    errors
}

fn multipart_form(
    report: &EmergencyReport,
    image: &ImageAttachment,
) -> Result<Form, SubmissionError> {
    let operation = "create_emergency_report";
    let fields = serde_json::to_value(report).map_err(|e| SubmissionError::Encoding {
        operation: operation.into(),
        reason: format!("failed encoding report: {e}"),
    })?;

    let mut form = Form::new();
    if let Value::Object(obj) = fields {
        for (key, value) in obj {
            if let Value::String(s) = value {
                form = form.text(key, s);
            }
        }
    }

    let part = Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(&image.content_type)
        .map_err(|e| SubmissionError::Encoding {
            operation: operation.into(),
            reason: format!("invalid image content type {:?}: {e}", image.content_type),
        })?;
    Ok(form.part("foto", part))
}

#[async_trait]
impl SubmissionGateway for HttpGateway {
    async fn create_emergency_report(
        &self,
        report: &EmergencyReport,
        image: Option<&ImageAttachment>,
    ) -> Result<EmergencyAck, SubmissionError> {
        let operation = "create_emergency_report";
        let url = self.config.emergency_url();
        let request = match image {
            Some(image) => self.post(&url).multipart(multipart_form(report, image)?),
            None => self.post(&url).json(report),
        };
        let body = self.send(operation, request).await?;
        if body.trim().is_empty() {
            return Ok(EmergencyAck::default());
        }
        decode(operation, &body)
    }

    async fn query_account_records(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<AccountRecord>, SubmissionError> {
        let operation = "query_account_records";
        let url = self.config.accounts_url();
        let body = self.send(operation, self.post(&url).json(query)).await?;
        decode_records(operation, &body)
    }

    async fn compare_records(&self, ids: &[String]) -> Result<Comparison, SubmissionError> {
        let operation = "compare_records";
        let url = self.config.compare_url();
        let payload = serde_json::json!({ "ids": ids });
        let body = self.send(operation, self.post(&url).json(&payload)).await?;
        decode(operation, &body)
    }

    async fn ask(
        &self,
        question: &str,
        context: &QuestionContext,
    ) -> Result<String, SubmissionError> {
        let operation = "ask";
        let url = self.config.chat_url();
        let payload = serde_json::json!({
            "pregunta": question,
            "contexto": context,
        });
        let body = self.send(operation, self.post(&url).json(&payload)).await?;
        let value: Value = decode(operation, &body)?;
        value
            .get("respuesta")
            .or_else(|| value.get("answer"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SubmissionError::MalformedResponse {
                operation: operation.to_string(),
                reason: "missing `respuesta` field".to_string(),
            })
    }
}
