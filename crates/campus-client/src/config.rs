//! Collaborator client configuration.
//!
//! Base URLs for each external service. Defaults point at local ports so a
//! development server starts without any collaborator running.

use url::Url;

/// Configuration for the collaborator clients.
///
/// Custom `Debug` implementation redacts the `api_token` field.
#[derive(Clone)]
pub struct CollaboratorConfig {
    /// Base URL of the evidence scorer.
    pub evidence_scorer_url: Url,
    /// Base URL of the bank-account resolver.
    pub bank_resolver_url: Url,
    /// Base URL of the verification report intake.
    pub report_intake_url: Url,
    /// Bearer token sent to every collaborator, if set.
    pub api_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CollaboratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorConfig")
            .field("evidence_scorer_url", &self.evidence_scorer_url)
            .field("bank_resolver_url", &self.bank_resolver_url)
            .field("report_intake_url", &self.report_intake_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CollaboratorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `EVIDENCE_SCORER_URL` (default: `http://127.0.0.1:9101`)
    /// - `BANK_RESOLVER_URL` (default: `http://127.0.0.1:9102`)
    /// - `REPORT_INTAKE_URL` (default: `http://127.0.0.1:9103`)
    /// - `COLLABORATOR_TOKEN` (optional)
    /// - `COLLABORATOR_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            evidence_scorer_url: env_url("EVIDENCE_SCORER_URL", "http://127.0.0.1:9101")?,
            bank_resolver_url: env_url("BANK_RESOLVER_URL", "http://127.0.0.1:9102")?,
            report_intake_url: env_url("REPORT_INTAKE_URL", "http://127.0.0.1:9103")?,
            api_token: std::env::var("COLLABORATOR_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            timeout_secs: std::env::var("COLLABORATOR_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        })
    }

    /// Every collaborator behind one base URL (for tests and local stubs).
    pub fn single(base: &str) -> Result<Self, ConfigError> {
        let url =
            Url::parse(base).map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()))?;
        Ok(Self {
            evidence_scorer_url: url.clone(),
            bank_resolver_url: url.clone(),
            report_intake_url: url,
            api_token: None,
            timeout_secs: 5,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A URL variable did not parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    /// The token cannot be sent as a header.
    #[error("COLLABORATOR_TOKEN contains characters not allowed in a header")]
    InvalidToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_points_every_client_at_one_server() {
        let cfg = CollaboratorConfig::single("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.evidence_scorer_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(cfg.report_intake_url, cfg.bank_resolver_url);
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("CAMPUS_UNSET_VAR_4821", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn debug_redacts_token() {
        let mut cfg = CollaboratorConfig::single("http://127.0.0.1:9000").unwrap();
        cfg.api_token = Some("s3cret".into());
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
