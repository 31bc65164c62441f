//! Configuration tests that do not touch the process environment.

use std::path::PathBuf;
use std::time::Duration;

use bankview::config::{AppConfig, BackendConfig, PushConfig};
use bankview::models::{AccountId, Scope};
use bankview::push::{BackoffPolicy, PushEndpoint, PushMode};

fn config(mode: PushMode) -> AppConfig {
    AppConfig {
        backend: BackendConfig {
            api_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
        },
        push: PushConfig {
            mode,
            websocket_url: "ws://localhost:8080".to_string(),
            shared_path: "/subscribe".to_string(),
            backoff: BackoffPolicy::default(),
        },
        log_file: PathBuf::from("bankview.log"),
    }
}

fn account(id: &str) -> Scope {
    Scope::Account(AccountId::parse(id).unwrap())
}

#[test]
fn test_shared_feed_path_is_configurable() {
    let config = config(PushMode::SharedWebSocket);
    assert_eq!(
        config.endpoint_for(&account("acc-1")),
        Some(PushEndpoint::websocket("ws://localhost:8080/subscribe"))
    );
    assert_eq!(
        config.endpoint_for(&Scope::Global),
        config.endpoint_for(&account("acc-2"))
    );
}

#[test]
fn test_scoped_feed_per_account() {
    let config = config(PushMode::ScopedWebSocket);
    assert_eq!(
        config.endpoint_for(&account("acc-1")),
        Some(PushEndpoint::websocket("ws://localhost:8080/ws/acc-1"))
    );
}

#[test]
fn test_push_off_has_no_endpoint() {
    let config = config(PushMode::Off);
    assert_eq!(config.endpoint_for(&account("acc-1")), None);
    assert_eq!(config.endpoint_for(&Scope::Global), None);
}

#[test]
fn test_api_url_override_rederives_websocket_url() {
    let mut config = config(PushMode::SharedWebSocket);
    config.set_api_url("https://bank.example.com/", false).unwrap();

    assert_eq!(config.backend.api_url, "https://bank.example.com");
    assert_eq!(config.push.websocket_url, "wss://bank.example.com");
}

#[test]
fn test_api_url_override_keeps_explicit_websocket_url() {
    let mut config = config(PushMode::SharedWebSocket);
    config.set_api_url("http://10.0.0.2:9000", true).unwrap();

    assert_eq!(config.backend.api_url, "http://10.0.0.2:9000");
    assert_eq!(config.push.websocket_url, "ws://localhost:8080");
}

#[test]
fn test_api_url_override_rejects_other_schemes() {
    let mut config = config(PushMode::SharedWebSocket);
    let err = config.set_api_url("ftp://bank", false).unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[test]
fn test_push_mode_parses_cli_names() {
    assert_eq!("none".parse::<PushMode>().unwrap(), PushMode::Off);
    assert_eq!("ws".parse::<PushMode>().unwrap(), PushMode::SharedWebSocket);
    assert_eq!(
        "ws-scoped".parse::<PushMode>().unwrap(),
        PushMode::ScopedWebSocket
    );
    assert_eq!("sse".parse::<PushMode>().unwrap(), PushMode::ServerSentEvents);
    assert!("carrier-pigeon".parse::<PushMode>().is_err());
}
