//! Evidence scorer client.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/score` | Score dispute evidence |

use async_trait::async_trait;
use campus_arbitration::{EvidenceScorer, ScoreReport, ScoreRequest, ScorerError};
use url::Url;

use crate::error::ClientError;

/// Client for the computer-vision evidence scorer.
#[derive(Debug, Clone)]
pub struct EvidenceScorerClient {
    http: reqwest::Client,
    base_url: Url,
}

impl EvidenceScorerClient {
    pub(crate) fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Score a dispute's evidence.
    ///
    /// Scoring has no side effects on the scorer, so retries are safe.
    pub async fn score_evidence(&self, request: &ScoreRequest) -> Result<ScoreReport, ClientError> {
        let endpoint = "POST /v1/score";
        let url = crate::join(&self.base_url, "v1/score");
        let resp = crate::retry::retry_send(endpoint, || self.http.post(&url).json(request).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        crate::read_json(endpoint, resp).await
    }
}

#[async_trait]
impl EvidenceScorer for EvidenceScorerClient {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReport, ScorerError> {
        Ok(self.score_evidence(request).await?)
    }
}
