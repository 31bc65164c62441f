//! HTTP client for the balance read and deposit endpoints.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::models::{BalanceResponse, DepositAmount, Scope};
use crate::{BankviewError, Result};

/// Connection establishment timeout. Per-request timeouts come from
/// [`BackendConfig::request_timeout`] so the same client can also carry
/// long-lived event streams.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the balance service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BankClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl BankClient {
    /// Builds a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`BankviewError::Network`] if the HTTP client cannot be
    /// constructed (TLS backend initialization).
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    /// Underlying HTTP client, shared with SSE streams.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Reads the current balance for `scope`.
    ///
    /// # Errors
    ///
    /// - [`BankviewError::Network`] if the request fails or times out
    /// - [`BankviewError::Status`] on a non-2xx response
    /// - [`BankviewError::MalformedPayload`] if the body is not `{"balance": n}`
    pub async fn fetch_balance(&self, scope: &Scope) -> Result<Decimal> {
        let url = self.url(&scope.balance_path());
        debug!(url = %url, "Fetching balance");

        let response = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let body = read_body(response).await?;
        let balance = parse_balance(&body)?;

        debug!(url = %url, balance = %balance, "Fetched balance");
        Ok(balance)
    }

    /// Submits a deposit for `scope`.
    ///
    /// Returns the new balance when the response carries one, or `None`
    /// for an empty 2xx body, in which case the caller should re-read.
    ///
    /// # Errors
    ///
    /// Same as [`BankClient::fetch_balance`].
    pub async fn deposit(&self, scope: &Scope, amount: &DepositAmount) -> Result<Option<Decimal>> {
        let url = self.url(&scope.deposit_path(amount));
        info!(url = %url, amount = %amount, "Submitting deposit");

        let response = self
            .http
            .post(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let body = read_body(response).await?;
        if body.trim().is_empty() {
            info!(url = %url, "Deposit accepted without balance in response");
            return Ok(None);
        }

        let balance = parse_balance(&body)?;
        info!(url = %url, balance = %balance, "Deposit accepted");
        Ok(Some(balance))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Returns the body of a 2xx response, or a status error.
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BankviewError::status(status.as_u16(), &body));
    }
    Ok(body)
}

fn parse_balance(body: &str) -> Result<Decimal> {
    serde_json::from_str::<BalanceResponse>(body)
        .map(|response| response.balance)
        .map_err(|e| BankviewError::MalformedPayload(format!("balance response: {e}")))
}
