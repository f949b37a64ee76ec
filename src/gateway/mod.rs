//! Submission gateway — the boundary to the cooperative's backend.
//!
//! The conversation core only ever talks to [`SubmissionGateway`]; the HTTP
//! implementation lives in [`http`] and tests substitute their own.

pub mod http;
pub mod model;

use async_trait::async_trait;

use crate::error::SubmissionError;

pub use http::HttpGateway;
pub use model::{
    AccountQuery, AccountRecord, CompareStats, Comparison, EmergencyAck, EmergencyReport,
    GatewayReply, GatewayRequest, ImageAttachment, QuestionContext,
};

/// Remote operations used by the flows. One call per finalized record.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn create_emergency_report(
        &self,
        report: &EmergencyReport,
        image: Option<&ImageAttachment>,
    ) -> Result<EmergencyAck, SubmissionError>;

    async fn query_account_records(
        &self,
        query: &AccountQuery,
    ) -> Result<Vec<AccountRecord>, SubmissionError>;

    async fn compare_records(&self, ids: &[String]) -> Result<Comparison, SubmissionError>;

    /// Answer a free-form question, given the conversation so far.
    async fn ask(&self, question: &str, context: &QuestionContext)
    -> Result<String, SubmissionError>;
}

/// Perform `request` against `gateway`.
pub async fn dispatch(
    gateway: &dyn SubmissionGateway,
    request: &GatewayRequest,
) -> Result<GatewayReply, SubmissionError> {
    tracing::info!(operation = request.operation(), "Dispatching gateway request");
    match request {
        GatewayRequest::CreateEmergency { report, image } => gateway
            .create_emergency_report(report, image.as_ref())
            .await
            .map(GatewayReply::EmergencyCreated),
        GatewayRequest::QueryAccounts(query) => gateway
            .query_account_records(query)
            .await
            .map(GatewayReply::Accounts),
        GatewayRequest::Compare { ids } => gateway
            .compare_records(ids)
            .await
            .map(GatewayReply::Compared),
        GatewayRequest::Ask { question, context } => gateway
            .ask(question, context)
            .await
            .map(GatewayReply::Answer),
    }
}
