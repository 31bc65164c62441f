//! Push channels: transports, events, and the shared connection pool.
//!
//! This module is organized by concern:
//! - [`backoff`] - Reconnection delay policy
//! - [`pool`] - Reference-counted connections keyed by endpoint
//!
//! The transport loops themselves live in [`crate::websocket`] and
//! [`crate::sse`]; both report through a [`Link`] and stop when their
//! [`Shutdown`] fires.

pub mod backoff;
pub mod pool;

use std::fmt;
use std::str::FromStr;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::BankviewError;
use crate::models::{PushMessage, Scope};

pub use backoff::{Backoff, BackoffPolicy};
pub use pool::{ConnectionPool, Lease, PushReceiver, PushSubscription};

/// How (and whether) a view receives push updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PushMode {
    /// No push channel; reads happen on open and on manual refresh.
    Off,
    /// One WebSocket for every account, filtered client-side.
    #[default]
    SharedWebSocket,
    /// One WebSocket per account at `/ws/{id}`.
    ScopedWebSocket,
    /// One server-sent-events stream per account at `/events/{id}`.
    ServerSentEvents,
}

impl PushMode {
    /// Configuration name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            PushMode::Off => "none",
            PushMode::SharedWebSocket => "ws",
            PushMode::ScopedWebSocket => "ws-scoped",
            PushMode::ServerSentEvents => "sse",
        }
    }
}

impl FromStr for PushMode {
    type Err = BankviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(PushMode::Off),
            "ws" | "websocket" => Ok(PushMode::SharedWebSocket),
            "ws-scoped" => Ok(PushMode::ScopedWebSocket),
            "sse" => Ok(PushMode::ServerSentEvents),
            other => Err(BankviewError::Config(format!(
                "unknown push mode {other:?} (expected none, ws, ws-scoped or sse)"
            ))),
        }
    }
}

/// Wire transport of a push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    WebSocket,
    EventSource,
}

/// A push connection target. Two views with equal endpoints share one
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PushEndpoint {
    pub transport: Transport,
    pub url: String,
}

impl PushEndpoint {
    pub fn websocket(url: impl Into<String>) -> Self {
        Self {
            transport: Transport::WebSocket,
            url: url.into(),
        }
    }

    pub fn event_source(url: impl Into<String>) -> Self {
        Self {
            transport: Transport::EventSource,
            url: url.into(),
        }
    }
}

/// Resolves the endpoint a view with `scope` subscribes to.
///
/// Returns `None` when the mode is [`PushMode::Off`], or for the global
/// view under [`PushMode::ServerSentEvents`], which only exists per account.
/// The global view under [`PushMode::ScopedWebSocket`] falls back to the
/// shared feed.
pub fn endpoint_for(
    mode: PushMode,
    scope: &Scope,
    api_url: &str,
    websocket_url: &str,
    shared_path: &str,
) -> Option<PushEndpoint> {
    let api_url = api_url.trim_end_matches('/');
    let websocket_url = websocket_url.trim_end_matches('/');
    let shared = || PushEndpoint::websocket(format!("{websocket_url}{shared_path}"));

    match (mode, scope) {
        (PushMode::Off, _) => None,
        (PushMode::SharedWebSocket, _) | (PushMode::ScopedWebSocket, Scope::Global) => {
            Some(shared())
        }
        (PushMode::ScopedWebSocket, Scope::Account(id)) => {
            Some(PushEndpoint::websocket(format!("{websocket_url}/ws/{id}")))
        }
        (PushMode::ServerSentEvents, Scope::Account(id)) => {
            Some(PushEndpoint::event_source(format!("{api_url}/events/{id}")))
        }
        (PushMode::ServerSentEvents, Scope::Global) => None,
    }
}

/// Connection state of a push link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// The view has no push channel.
    #[default]
    Off,
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    /// The connection was shut down after its last subscriber left.
    Closed,
}

impl LinkStatus {
    /// Returns a display string for the status.
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::Off => "No push",
            LinkStatus::Connecting => "Connecting...",
            LinkStatus::Connected => "Open",
            LinkStatus::Disconnected => "Offline",
            LinkStatus::Reconnecting => "Reconnecting...",
            LinkStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Something a push connection reports to its subscribers.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// The connection state changed.
    Status(LinkStatus),
    /// A balance carried directly in the payload.
    Balance {
        message: PushMessage,
        payload: String,
    },
    /// A notification without a usable balance; re-read the balance.
    Refresh { payload: String },
    /// A payload that should have carried a balance but did not parse.
    Malformed { payload: String, reason: String },
    /// The subscriber fell behind and `skipped` events were dropped.
    Lagged { skipped: u64 },
}

impl PushEvent {
    /// Classifies a WebSocket text payload, which must be a [`PushMessage`].
    pub fn from_websocket(payload: &str) -> Self {
        match serde_json::from_str::<PushMessage>(payload) {
            Ok(message) => PushEvent::Balance {
                message,
                payload: payload.to_string(),
            },
            Err(e) => PushEvent::Malformed {
                payload: payload.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Classifies the data of an SSE `message` event. Anything that is not
    /// a [`PushMessage`] is a plain change signal.
    pub fn from_event_source(payload: &str) -> Self {
        match serde_json::from_str::<PushMessage>(payload) {
            Ok(message) => PushEvent::Balance {
                message,
                payload: payload.to_string(),
            },
            Err(_) => PushEvent::Refresh {
                payload: payload.to_string(),
            },
        }
    }
}

/// Sending side handed to a connection task.
pub struct Link {
    events: broadcast::Sender<PushEvent>,
    status: watch::Sender<LinkStatus>,
    policy: BackoffPolicy,
}

impl Link {
    pub(crate) fn new(
        events: broadcast::Sender<PushEvent>,
        status: watch::Sender<LinkStatus>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            events,
            status,
            policy,
        }
    }

    /// Backoff policy for this connection.
    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Broadcasts an event to every subscriber.
    pub fn publish(&self, event: PushEvent) {
        if self.events.send(event).is_err() {
            debug!("Push event dropped, no subscribers");
        }
    }

    /// Records and broadcasts a status change.
    pub fn set_status(&self, status: LinkStatus) {
        self.status.send_replace(status);
        self.publish(PushEvent::Status(status));
    }
}

/// Resolves once the owning pool entry is gone.
pub struct Shutdown(watch::Receiver<()>);

impl Shutdown {
    pub(crate) fn new(rx: watch::Receiver<()>) -> Self {
        Self(rx)
    }

    /// Waits until the sender side is dropped.
    pub async fn wait(&mut self) {
        while self.0.changed().await.is_ok() {}
    }
}
