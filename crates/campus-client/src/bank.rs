//! Bank-account resolver client.
//!
//! Display-only: the resolved name is shown to a seller setting up payouts
//! and plays no part in escrow decisions.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/accounts/resolve` | Resolve account holder name |

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

/// Account holder as returned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountName {
    /// Bank code queried.
    pub bank_code: String,
    /// Account number queried.
    pub account_number: String,
    /// Name on the account.
    pub account_name: String,
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    bank_code: &'a str,
    account_number: &'a str,
}

/// Client for the bank-account resolver.
#[derive(Debug, Clone)]
pub struct BankResolverClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BankResolverClient {
    pub(crate) fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Resolve the holder of `account_number` at `bank_code`.
    ///
    /// Returns `Ok(None)` when the resolver reports no such account.
    pub async fn resolve_account(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<Option<AccountName>, ClientError> {
        validate(bank_code, account_number)?;
        let endpoint = "POST /v1/accounts/resolve";
        let url = crate::join(&self.base_url, "v1/accounts/resolve");
        let body = ResolveRequest {
            bank_code,
            account_number,
        };
        let resp = crate::retry::retry_send(endpoint, || self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| ClientError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        crate::read_json(endpoint, resp).await.map(Some)
    }
}

/// Account numbers are 10-digit NUBANs; bank codes are 3 to 6 digits.
fn validate(bank_code: &str, account_number: &str) -> Result<(), ClientError> {
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !(3..=6).contains(&bank_code.len()) || !digits(bank_code) {
        return Err(ClientError::InvalidRequest {
            reason: format!("bank code {bank_code:?} must be 3-6 digits"),
        });
    }
    if account_number.len() != 10 || !digits(account_number) {
        return Err(ClientError::InvalidRequest {
            reason: "account number must be 10 digits".into(),
        });
    }
    Ok(())
}
