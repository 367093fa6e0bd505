//! Verification report intake client.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/reports` | Submit a verification report |
//!
//! The submission digest is sent as `Idempotency-Key`, so a retried POST
//! cannot create a second report.

use async_trait::async_trait;
use campus_audit::{ReportSubmitter, SubmissionReceipt, SubmitterError, VerificationReportSubmission};
use url::Url;

use crate::error::ClientError;

/// Client for the report intake service.
#[derive(Debug, Clone)]
pub struct ReportIntakeClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ReportIntakeClient {
    pub(crate) fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Submit a report and return the server's receipt.
    pub async fn submit_report(
        &self,
        report: &VerificationReportSubmission,
    ) -> Result<SubmissionReceipt, ClientError> {
        let endpoint = "POST /v1/reports";
        let url = crate::join(&self.base_url, "v1/reports");
        let key = report.digest.to_hex();
        let resp = crate::retry::retry_send(endpoint, || {
            self.http
                .post(&url)
                .header("Idempotency-Key", &key)
                .json(report)
                .send()
        })
        .await
        .map_err(|e| ClientError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;
        crate::read_json(endpoint, resp).await
    }
}

#[async_trait]
impl ReportSubmitter for ReportIntakeClient {
    async fn submit(
        &self,
        report: &VerificationReportSubmission,
    ) -> Result<SubmissionReceipt, SubmitterError> {
        Ok(self.submit_report(report).await?)
    }
}
