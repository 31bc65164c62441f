//! Application configuration loaded from environment variables.
//!
//! Every variable is optional:
//! - `BANKVIEW_API_URL`: base URL of the balance service (`http://localhost:8080`)
//! - `BANKVIEW_WEBSOCKET_URL`: base URL for WebSocket feeds (derived from the API URL)
//! - `BANKVIEW_PUSH_MODE`: `none`, `ws`, `ws-scoped` or `sse` (`ws`)
//! - `BANKVIEW_SHARED_FEED_PATH`: path of the shared WebSocket feed (`/ws`)
//! - `BANKVIEW_REQUEST_TIMEOUT_SECS`: per-request HTTP timeout (`10`)
//! - `BANKVIEW_BACKOFF_INITIAL_MS` / `BANKVIEW_BACKOFF_MAX_MS`: reconnect backoff (`1000` / `60000`)
//! - `BANKVIEW_LOG_FILE`: where logs are written while the TUI owns the terminal (`bankview.log`)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::BankviewError;
use crate::models::Scope;
use crate::push::{self, BackoffPolicy, PushEndpoint, PushMode};

/// Default base URL of the balance service.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default path of the shared WebSocket feed.
pub const DEFAULT_SHARED_FEED_PATH: &str = "/ws";

/// Default log file.
pub const DEFAULT_LOG_FILE: &str = "bankview.log";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub push: PushConfig,
    pub log_file: PathBuf,
}

/// HTTP backend settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub api_url: String,
    pub request_timeout: Duration,
}

/// Push channel settings.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub mode: PushMode,
    pub websocket_url: String,
    pub shared_path: String,
    pub backoff: BackoffPolicy,
}

impl AppConfig {
    /// Resolves the push endpoint for a view, if any.
    pub fn endpoint_for(&self, scope: &Scope) -> Option<PushEndpoint> {
        push::endpoint_for(
            self.push.mode,
            scope,
            &self.backend.api_url,
            &self.push.websocket_url,
            &self.push.shared_path,
        )
    }

    /// Replaces the API URL, re-deriving the WebSocket URL unless it was
    /// set explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`BankviewError::Config`] if the URL is not http(s).
    pub fn set_api_url(&mut self, api_url: &str, websocket_url_explicit: bool) -> crate::Result<()> {
        let api_url = validate_url("API URL", api_url, &["http://", "https://"])?;
        if !websocket_url_explicit {
            self.push.websocket_url = derive_websocket_url(&api_url);
        }
        self.backend.api_url = api_url;
        Ok(())
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`BankviewError::Config`] if a URL has the wrong scheme, a
/// number does not parse, the push mode is unknown, or the backoff bounds
/// are inconsistent.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let api_url = validate_url(
        "BANKVIEW_API_URL",
        &non_empty_var("BANKVIEW_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        &["http://", "https://"],
    )?;

    let websocket_url = match non_empty_var("BANKVIEW_WEBSOCKET_URL") {
        Some(url) => validate_url("BANKVIEW_WEBSOCKET_URL", &url, &["ws://", "wss://"])?,
        None => derive_websocket_url(&api_url),
    };

    let mode = match non_empty_var("BANKVIEW_PUSH_MODE") {
        Some(mode) => PushMode::from_str(&mode)?,
        None => PushMode::default(),
    };

    let shared_path = non_empty_var("BANKVIEW_SHARED_FEED_PATH")
        .unwrap_or_else(|| DEFAULT_SHARED_FEED_PATH.to_string());
    if !shared_path.starts_with('/') {
        return Err(BankviewError::Config(format!(
            "BANKVIEW_SHARED_FEED_PATH must start with '/', got {shared_path:?}"
        )));
    }

    let request_timeout = Duration::from_secs(
        parse_var("BANKVIEW_REQUEST_TIMEOUT_SECS")?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
    );

    let defaults = BackoffPolicy::default();
    let backoff = BackoffPolicy {
        initial: parse_var("BANKVIEW_BACKOFF_INITIAL_MS")?
            .map_or(defaults.initial, Duration::from_millis),
        max: parse_var("BANKVIEW_BACKOFF_MAX_MS")?.map_or(defaults.max, Duration::from_millis),
    };
    if backoff.initial.is_zero() || backoff.initial > backoff.max {
        return Err(BankviewError::Config(format!(
            "backoff must satisfy 0 < initial <= max, got {}ms / {}ms",
            backoff.initial.as_millis(),
            backoff.max.as_millis()
        )));
    }

    let log_file = non_empty_var("BANKVIEW_LOG_FILE")
        .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from);

    Ok(AppConfig {
        backend: BackendConfig {
            api_url,
            request_timeout,
        },
        push: PushConfig {
            mode,
            websocket_url,
            shared_path,
            backoff,
        },
        log_file,
    })
}

/// Maps `http(s)://host` to `ws(s)://host`.
fn derive_websocket_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

/// Checks the scheme and strips trailing slashes.
fn validate_url(name: &str, url: &str, schemes: &[&str]) -> crate::Result<String> {
    if !schemes.iter().any(|scheme| url.starts_with(scheme)) {
        return Err(BankviewError::Config(format!(
            "{name} must start with {}, got {url:?}",
            schemes.join(" or ")
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Parses a numeric environment variable if present.
fn parse_var(name: &str) -> crate::Result<Option<u64>> {
    non_empty_var(name)
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                BankviewError::Config(format!("{name} must be a whole number, got {value:?}"))
            })
        })
        .transpose()
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
