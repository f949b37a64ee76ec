//! Data exchanged with the remote service.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::flow::catalog::{FlowKind, keys};
use crate::flow::normalize::machine_key;
use crate::flow::state::{ConversationRecord, FieldValue};
use crate::transcript::TranscriptEntry;

/// An image the user attached to an emergency report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension.
    pub fn content_type_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "heic" => "image/heic",
            _ => "application/octet-stream",
        }
    }
}

/// Frozen emergency record, in the wire shape the service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyReport {
    pub nombre_completo: String,
    pub telefono: String,
    pub sector: String,
    pub direccion: String,
    pub tipo_emergencia: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_emergencia_otro: Option<String>,
    pub estado_emergencia: String,
    pub descripcion: String,
}

impl EmergencyReport {
    /// Build the payload from a completed record. Menu labels become machine
    /// keys; an "Other" answer becomes `otro` plus the user's text.
    pub fn from_record(record: &ConversationRecord) -> Self {
        let (tipo_emergencia, tipo_emergencia_otro) = match record.get(keys::EMERGENCY_TYPE) {
            Some(FieldValue::Other { text }) => ("otro".to_string(), Some(text.clone())),
            Some(value) => (wire_value(value), None),
            None => (String::new(), None),
        };
        Self {
            nombre_completo: wire_field(record, keys::FULL_NAME),
            telefono: wire_field(record, keys::PHONE),
            sector: wire_field(record, keys::SECTOR),
            direccion: wire_field(record, keys::ADDRESS),
            tipo_emergencia,
            tipo_emergencia_otro,
            estado_emergencia: wire_field(record, keys::SEVERITY),
            descripcion: wire_field(record, keys::DESCRIPTION),
        }
    }
}

/// Frozen account lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub tipo_consulta: String,
    pub metodo_identificacion: String,
    pub valor_identificacion: String,
}

impl AccountQuery {
    pub fn from_record(record: &ConversationRecord) -> Self {
        Self {
            tipo_consulta: wire_field(record, keys::QUERY_TYPE),
            metodo_identificacion: wire_field(record, keys::ID_METHOD),
            valor_identificacion: wire_field(record, keys::ID_VALUE),
        }
    }
}

fn wire_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text { value } => value.clone(),
        FieldValue::Choice { label, .. } => machine_key(label),
        FieldValue::Other { text } => text.clone(),
    }
}

fn wire_field(record: &ConversationRecord, key: &str) -> String {
    record.get(key).map(wire_value).unwrap_or_default()
}

/// Acknowledgement of a created emergency report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAck {
    /// Identifier assigned by the service, when it returns one.
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub mensaje: Option<String>,
}

/// One invoice/account record returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    #[serde(deserialize_with = "required_id_as_string")]
    pub id: String,
    #[serde(default)]
    pub numero_cliente: Option<String>,
    #[serde(default)]
    pub periodo: Option<String>,
    /// Consumption in cubic metres.
    #[serde(default)]
    pub consumo: Option<Decimal>,
    #[serde(default)]
    pub monto: Option<Decimal>,
    #[serde(default)]
    pub vencimiento: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
}

/// Aggregates computed by the service for a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareStats {
    #[serde(alias = "cantidad")]
    pub count: u32,
    #[serde(alias = "consumo_total")]
    pub total_consumption: Decimal,
    #[serde(alias = "monto_total")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(alias = "boletas")]
    pub records: Vec<AccountRecord>,
    #[serde(alias = "estadisticas")]
    pub stats: CompareStats,
}

/// Context sent along with a free-form question.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionContext {
    pub flow: Option<FlowKind>,
    pub record: BTreeMap<String, String>,
    pub history: Vec<TranscriptEntry>,
}

/// A logical call to the remote service.
#[derive(Debug, Clone)]
pub enum GatewayRequest {
    CreateEmergency {
        report: EmergencyReport,
        image: Option<ImageAttachment>,
    },
    QueryAccounts(AccountQuery),
    Compare { ids: Vec<String> },
    Ask {
        question: String,
        context: QuestionContext,
    },
}

impl GatewayRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateEmergency { .. } => "create_emergency_report",
            Self::QueryAccounts(_) => "query_account_records",
            Self::Compare { .. } => "compare_records",
            Self::Ask { .. } => "ask",
        }
    }
}

/// Successful outcome of a [`GatewayRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReply {
    EmergencyCreated(EmergencyAck),
    Accounts(Vec<AccountRecord>),
    Compared(Comparison),
    Answer(String),
}

/// Services return numeric or string ids; keep them as strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn required_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    id_as_string(deserializer)?.ok_or_else(|| serde::de::Error::custom("id must be a string or number"))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn emergency_record() -> ConversationRecord {
        let mut record = ConversationRecord::new();
        record.set(keys::FULL_NAME, FieldValue::text("Ana Pérez"));
        record.set(keys::PHONE, FieldValue::text("+56912345678"));
        record.set(keys::SECTOR, FieldValue::choice(3, "La Compañía"));
        record.set(keys::ADDRESS, FieldValue::text("Calle Falsa 123"));
        record.set(keys::EMERGENCY_TYPE, FieldValue::choice(2, "Baja Presión"));
        record.set(keys::SEVERITY, FieldValue::choice(1, "Baja"));
        record.set(keys::DESCRIPTION, FieldValue::text("Hay una fuga grande"));
        record
    }

    #[test]
    fn emergency_payload_uses_machine_keys() {
        let report = EmergencyReport::from_record(&emergency_record());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nombreCompleto"], "Ana Pérez");
        assert_eq!(json["sector"], "la_compania");
        assert_eq!(json["tipoEmergencia"], "baja_presion");
        assert_eq!(json["estadoEmergencia"], "baja");
        assert_eq!(json["descripcion"], "Hay una fuga grande");
        assert!(json.get("tipoEmergenciaOtro").is_none());
    }

    #[test]
    fn other_emergency_type_sends_text_separately() {
        let mut record = emergency_record();
        record.set(keys::EMERGENCY_TYPE, FieldValue::other("Explosión de tubería"));
        let report = EmergencyReport::from_record(&record);
        assert_eq!(report.tipo_emergencia, "otro");
        assert_eq!(
            report.tipo_emergencia_otro.as_deref(),
            Some("Explosión de tubería")
        );
    }

    #[test]
    fn account_query_payload() {
        let mut record = ConversationRecord::new();
        record.set(keys::QUERY_TYPE, FieldValue::choice(3, "Comparar boletas"));
        record.set(keys::ID_METHOD, FieldValue::choice(2, "RUT"));
        record.set(keys::ID_VALUE, FieldValue::text("12345678-9"));
        let json = serde_json::to_value(AccountQuery::from_record(&record)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tipoConsulta": "comparar",
                "metodoIdentificacion": "rut",
                "valorIdentificacion": "12345678-9"
            })
        );
    }

    #[test]
    fn account_record_accepts_numeric_ids_and_amounts() {
        let record: AccountRecord = serde_json::from_value(serde_json::json!({
            "id": 42,
            "periodo": "2025-01",
            "consumo": 12.5,
            "monto": "15990"
        }))
        .unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.consumo, Some(dec!(12.5)));
        assert_eq!(record.monto, Some(dec!(15990)));
        assert!(record.estado.is_none());
    }

    #[test]
    fn account_record_without_id_is_rejected() {
        let parsed = serde_json::from_value::<AccountRecord>(serde_json::json!({"periodo": "2025-01"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn content_type_guess() {
        assert_eq!(ImageAttachment::content_type_for("fuga.JPG"), "image/jpeg");
        assert_eq!(ImageAttachment::content_type_for("fuga.png"), "image/png");
        assert_eq!(
            ImageAttachment::content_type_for("sin_extension"),
            "application/octet-stream"
        );
    }
}
