//! # campus-client — Collaborator HTTP Clients
//!
//! Typed access to the services the engine depends on but does not own:
//! - **Evidence scorer**: `POST /v1/score`, advisory dispute scores
//! - **Bank-account resolver**: `POST /v1/accounts/resolve`, display-only KYC
//! - **Report intake**: `POST /v1/reports`, accepts verification submissions
//!
//! Every request is retried on transport failure with exponential backoff.
//! Requests that create server state carry an `Idempotency-Key` header so
//! retries are safe.

pub mod bank;
pub mod config;
pub mod error;
pub mod intake;
pub(crate) mod retry;
pub mod scorer;

pub use bank::{AccountName, BankResolverClient};
pub use config::{CollaboratorConfig, ConfigError};
pub use error::ClientError;
pub use intake::ReportIntakeClient;
pub use scorer::EvidenceScorerClient;

use std::time::Duration;

use serde::de::DeserializeOwned;

/// All collaborator clients, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct CampusClient {
    scorer: EvidenceScorerClient,
    bank: BankResolverClient,
    intake: ReportIntakeClient,
}

impl CampusClient {
    /// Build the clients from configuration.
    pub fn new(config: CollaboratorConfig) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.api_token {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ClientError::Config(ConfigError::InvalidToken))?,
            );
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            scorer: EvidenceScorerClient::new(http.clone(), config.evidence_scorer_url),
            bank: BankResolverClient::new(http.clone(), config.bank_resolver_url),
            intake: ReportIntakeClient::new(http, config.report_intake_url),
        })
    }

    /// The evidence scorer client.
    pub fn scorer(&self) -> &EvidenceScorerClient {
        &self.scorer
    }

    /// The bank-account resolver client.
    pub fn bank(&self) -> &BankResolverClient {
        &self.bank
    }

    /// The report intake client.
    pub fn intake(&self) -> &ReportIntakeClient {
        &self.intake
    }
}

/// Map a non-2xx response to [`ClientError::Api`], otherwise decode the body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            endpoint: endpoint.into(),
            status,
            body,
        });
    }
    resp.json().await.map_err(|e| ClientError::Deserialization {
        endpoint: endpoint.into(),
        source: e,
    })
}

pub(crate) fn join(base: &url::Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'))
}
