//! Reference-counted push connections.
//!
//! [`ConnectionPool`] keeps at most one connection per [`PushEndpoint`].
//! Every [`ConnectionPool::acquire`] bumps the endpoint's count and
//! returns a [`PushSubscription`]; dropping its [`Lease`] decrements the
//! count, and the last drop closes the connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{info, trace, warn};

use super::{BackoffPolicy, Link, LinkStatus, PushEndpoint, PushEvent, Shutdown, Transport};
use crate::models::Scope;
use crate::{sse, websocket};

/// Per-connection event buffer. Slow subscribers skip ahead rather than
/// block the connection.
const EVENT_BUFFER: usize = 64;

/// Shared handle to the set of live push connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    http: reqwest::Client,
    policy: BackoffPolicy,
    entries: Mutex<HashMap<PushEndpoint, PoolEntry>>,
}

struct PoolEntry {
    refs: usize,
    events: broadcast::Sender<PushEvent>,
    status: watch::Receiver<LinkStatus>,
    /// Dropping this stops the connection task.
    _shutdown: watch::Sender<()>,
}

impl PoolInner {
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<PushEndpoint, PoolEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionPool {
    /// Creates an empty pool. `http` is used for SSE streams.
    pub fn new(http: reqwest::Client, policy: BackoffPolicy) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                http,
                policy,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Subscribes `scope` to `endpoint`, opening the connection if this
    /// is its first subscriber.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire(&self, endpoint: &PushEndpoint, scope: Scope) -> PushSubscription {
        let mut entries = self.inner.lock_entries();
        let entry = entries
            .entry(endpoint.clone())
            .or_insert_with(|| self.open(endpoint));
        entry.refs += 1;
        info!(
            url = %endpoint.url,
            refs = entry.refs,
            "Acquired push connection"
        );

        PushSubscription {
            receiver: PushReceiver {
                scope,
                events: entry.events.subscribe(),
                status: entry.status.clone(),
            },
            lease: Lease {
                pool: self.inner.clone(),
                endpoint: endpoint.clone(),
            },
        }
    }

    /// Number of open connections.
    pub fn active_connections(&self) -> usize {
        self.inner.lock_entries().len()
    }

    /// Number of live leases on `endpoint`.
    pub fn ref_count(&self, endpoint: &PushEndpoint) -> usize {
        self.inner
            .lock_entries()
            .get(endpoint)
            .map_or(0, |entry| entry.refs)
    }

    /// Spawns the connection task for a new endpoint.
    fn open(&self, endpoint: &PushEndpoint) -> PoolEntry {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(LinkStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let link = Link::new(events.clone(), status_tx, self.inner.policy);
        let shutdown = Shutdown::new(shutdown_rx);
        let url = endpoint.url.clone();

        match endpoint.transport {
            Transport::WebSocket => {
                tokio::spawn(websocket::connection::run(url, link, shutdown));
            }
            Transport::EventSource => {
                tokio::spawn(sse::run_event_source(
                    self.inner.http.clone(),
                    url,
                    link,
                    shutdown,
                ));
            }
        }

        PoolEntry {
            refs: 0,
            events,
            status: status_rx,
            _shutdown: shutdown_tx,
        }
    }
}

/// Keeps a pooled connection open while alive.
pub struct Lease {
    pool: Arc<PoolInner>,
    endpoint: PushEndpoint,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut entries = self.pool.lock_entries();
        let Some(entry) = entries.get_mut(&self.endpoint) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            entries.remove(&self.endpoint);
            info!(url = %self.endpoint.url, "Last subscriber left, closing push connection");
        }
    }
}

/// Receives the events of one pooled connection that concern one scope.
pub struct PushReceiver {
    scope: Scope,
    events: broadcast::Receiver<PushEvent>,
    status: watch::Receiver<LinkStatus>,
}

impl PushReceiver {
    /// Current state of the underlying connection.
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Waits for the next event addressed to this scope.
    ///
    /// Balance messages for other accounts are skipped. The global view
    /// gets every payload as a [`PushEvent::Refresh`]. Returns `None` once
    /// the connection task has exited.
    pub async fn next(&mut self) -> Option<PushEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    if let Some(event) = self.route(event) {
                        return Some(event);
                    }
                    trace!("Skipping push message for another account");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Push subscriber lagged, skipping ahead");
                    return Some(PushEvent::Lagged { skipped });
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn route(&self, event: PushEvent) -> Option<PushEvent> {
        let global = matches!(self.scope, Scope::Global);
        match event {
            PushEvent::Balance { message, payload } => {
                if message.matches(&self.scope) {
                    Some(PushEvent::Balance { message, payload })
                } else if global {
                    Some(PushEvent::Refresh { payload })
                } else {
                    None
                }
            }
            // The global feed also carries plain notifications.
            PushEvent::Malformed { payload, .. } if global => Some(PushEvent::Refresh { payload }),
            event => Some(event),
        }
    }
}

/// A receiver together with the lease that keeps its connection open.
pub struct PushSubscription {
    receiver: PushReceiver,
    lease: Lease,
}

impl PushSubscription {
    /// Waits for the next event addressed to this subscription's scope.
    pub async fn next(&mut self) -> Option<PushEvent> {
        self.receiver.next().await
    }

    /// Current state of the underlying connection.
    pub fn status(&self) -> LinkStatus {
        self.receiver.status()
    }

    /// Splits the subscription so the lease can be released independently
    /// of the task draining the receiver.
    pub fn into_parts(self) -> (PushReceiver, Lease) {
        (self.receiver, self.lease)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{AccountId, PushMessage};

    fn account(id: &str) -> Scope {
        Scope::Account(AccountId::parse(id).unwrap())
    }

    fn pool() -> ConnectionPool {
        ConnectionPool::new(
            reqwest::Client::new(),
            BackoffPolicy {
                initial: Duration::from_secs(5),
                max: Duration::from_secs(5),
            },
        )
    }

    // Nothing listens on the discard port, so the tasks just back off.
    fn unreachable(path: &str) -> PushEndpoint {
        PushEndpoint::websocket(format!("ws://127.0.0.1:9{path}"))
    }

    fn balance_event(account_id: &str, balance: rust_decimal::Decimal) -> PushEvent {
        PushEvent::Balance {
            message: PushMessage {
                account_id: AccountId::parse(account_id).unwrap(),
                balance,
            },
            payload: format!("{account_id}:{balance}"),
        }
    }

    #[tokio::test]
    async fn shares_one_connection_per_endpoint() {
        let pool = pool();
        let endpoint = unreachable("/ws");

        let a = pool.acquire(&endpoint, account("a"));
        let b = pool.acquire(&endpoint, account("b"));
        assert_eq!(pool.active_connections(), 1);
        assert_eq!(pool.ref_count(&endpoint), 2);

        drop(a);
        assert_eq!(pool.active_connections(), 1);
        assert_eq!(pool.ref_count(&endpoint), 1);

        drop(b);
        assert_eq!(pool.active_connections(), 0);
        assert_eq!(pool.ref_count(&endpoint), 0);
    }

    #[tokio::test]
    async fn distinct_endpoints_get_distinct_connections() {
        let pool = pool();
        let _a = pool.acquire(&unreachable("/ws/a"), account("a"));
        let _b = pool.acquire(&unreachable("/ws/b"), account("b"));
        assert_eq!(pool.active_connections(), 2);
    }

    #[tokio::test]
    async fn lease_outlives_split_receiver() {
        let pool = pool();
        let endpoint = unreachable("/ws");

        let (receiver, lease) = pool.acquire(&endpoint, account("a")).into_parts();
        drop(receiver);
        assert_eq!(pool.ref_count(&endpoint), 1);

        drop(lease);
        assert_eq!(pool.active_connections(), 0);
    }

    #[tokio::test]
    async fn receiver_filters_other_accounts() {
        let (tx, rx) = broadcast::channel(8);
        let (_status_tx, status_rx) = watch::channel(LinkStatus::Connected);
        let mut receiver = PushReceiver {
            scope: account("a"),
            events: rx,
            status: status_rx,
        };

        tx.send(balance_event("b", dec!(99))).unwrap();
        tx.send(balance_event("a", dec!(42))).unwrap();
        drop(tx);

        let Some(PushEvent::Balance { message, .. }) = receiver.next().await else {
            panic!("expected a balance event");
        };
        assert_eq!(message.account_id.as_str(), "a");
        assert_eq!(message.balance, dec!(42));
        assert!(receiver.next().await.is_none());
    }

    #[tokio::test]
    async fn global_receiver_turns_payloads_into_refreshes() {
        let (tx, rx) = broadcast::channel(8);
        let (_status_tx, status_rx) = watch::channel(LinkStatus::Connected);
        let mut receiver = PushReceiver {
            scope: Scope::Global,
            events: rx,
            status: status_rx,
        };

        tx.send(balance_event("b", dec!(99))).unwrap();
        tx.send(PushEvent::from_websocket("notify")).unwrap();

        let Some(PushEvent::Refresh { payload }) = receiver.next().await else {
            panic!("expected a refresh for an account balance");
        };
        assert_eq!(payload, "b:99");
        let Some(PushEvent::Refresh { payload }) = receiver.next().await else {
            panic!("expected a refresh for a plain notification");
        };
        assert_eq!(payload, "notify");
        assert_eq!(receiver.status(), LinkStatus::Connected);
    }

    #[tokio::test]
    async fn account_receiver_keeps_malformed_payloads() {
        let (tx, rx) = broadcast::channel(8);
        let (_status_tx, status_rx) = watch::channel(LinkStatus::Connected);
        let mut receiver = PushReceiver {
            scope: account("a"),
            events: rx,
            status: status_rx,
        };

        tx.send(PushEvent::from_websocket("notify")).unwrap();
        assert!(matches!(
            receiver.next().await,
            Some(PushEvent::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn lagging_receiver_reports_skipped_events() {
        let (tx, rx) = broadcast::channel(2);
        let (_status_tx, status_rx) = watch::channel(LinkStatus::Connected);
        let mut receiver = PushReceiver {
            scope: account("a"),
            events: rx,
            status: status_rx,
        };

        for balance in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            tx.send(balance_event("a", balance)).unwrap();
        }

        assert!(matches!(
            receiver.next().await,
            Some(PushEvent::Lagged { skipped: 2 })
        ));
        let Some(PushEvent::Balance { message, .. }) = receiver.next().await else {
            panic!("expected the retained balances after the lag");
        };
        assert_eq!(message.balance, dec!(3));
    }
}
