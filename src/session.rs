//! Per-account network work.
//!
//! A [`Fetcher`] issues tagged reads and deposits and reports their
//! results as [`Message`]s. An [`AccountSession`] owns one fetcher plus the
//! account's push subscription; dropping the session releases the
//! subscription immediately. [`Sessions`] keeps one session per open view.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::{DepositAmount, Scope};
use crate::push::{ConnectionPool, Lease, LinkStatus, PushEvent, PushReceiver};
use crate::rest::BankClient;
use crate::sync::{Seq, Sequencer};
use crate::tui::{Message, Operation, TabId};

/// Issues reads and deposits for one scope on behalf of one tab.
#[derive(Clone)]
pub struct Fetcher {
    scope: Scope,
    tab: TabId,
    client: BankClient,
    sequencer: Arc<Sequencer>,
    tx: mpsc::UnboundedSender<Message>,
}

impl Fetcher {
    pub fn new(
        scope: Scope,
        tab: TabId,
        client: BankClient,
        sequencer: Arc<Sequencer>,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            scope,
            tab,
            client,
            sequencer,
            tx,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Spawns a balance read. Its result carries the returned tag.
    pub fn refresh(&self) -> Seq {
        let seq = self.sequencer.next();
        let fetcher = self.clone();
        tokio::spawn(async move {
            let message = match fetcher.client.fetch_balance(&fetcher.scope).await {
                Ok(balance) => Message::BalanceFetched {
                    scope: fetcher.scope.clone(),
                    tab: fetcher.tab,
                    seq,
                    balance,
                },
                Err(e) => {
                    warn!(scope = ?fetcher.scope, kind = e.kind(), "Balance read failed: {e}");
                    Message::RequestFailed {
                        scope: fetcher.scope.clone(),
                        tab: fetcher.tab,
                        operation: Operation::Fetch,
                        error: e.to_string(),
                    }
                }
            };
            fetcher.send(message);
        });
        seq
    }

    /// Spawns a deposit. A response without a balance triggers a read.
    pub fn deposit(&self, amount: DepositAmount) -> Seq {
        let seq = self.sequencer.next();
        let fetcher = self.clone();
        tokio::spawn(async move {
            let message = match fetcher.client.deposit(&fetcher.scope, &amount).await {
                Ok(balance) => {
                    if balance.is_none() {
                        fetcher.refresh();
                    }
                    Message::DepositCompleted {
                        scope: fetcher.scope.clone(),
                        tab: fetcher.tab,
                        seq,
                        amount,
                        balance,
                    }
                }
                Err(e) => {
                    warn!(scope = ?fetcher.scope, kind = e.kind(), "Deposit failed: {e}");
                    Message::RequestFailed {
                        scope: fetcher.scope.clone(),
                        tab: fetcher.tab,
                        operation: Operation::Deposit,
                        error: e.to_string(),
                    }
                }
            };
            fetcher.send(message);
        });
        seq
    }

    /// Sends to the UI loop. Returns `false` once the loop is gone.
    fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Network state of one open account view.
pub struct AccountSession {
    fetcher: Fetcher,
    lease: Option<Lease>,
    forwarder: Option<JoinHandle<()>>,
}

impl AccountSession {
    /// Subscribes to `pool` (when a push endpoint applies) and issues the
    /// initial read.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(fetcher: Fetcher, pool: &ConnectionPool, config: &AppConfig) -> Self {
        let (lease, forwarder) = match config.endpoint_for(fetcher.scope()) {
            Some(endpoint) => {
                let (receiver, lease) = pool
                    .acquire(&endpoint, fetcher.scope().clone())
                    .into_parts();
                let forwarder = tokio::spawn(forward_push(receiver, fetcher.clone()));
                (Some(lease), Some(forwarder))
            }
            None => {
                fetcher.send(Message::Link {
                    scope: fetcher.scope().clone(),
                    status: LinkStatus::Off,
                });
                (None, None)
            }
        };

        info!(scope = ?fetcher.scope(), push = lease.is_some(), "Opened account session");
        fetcher.refresh();

        Self {
            fetcher,
            lease,
            forwarder,
        }
    }

    /// Re-reads the balance.
    pub fn refresh(&self) -> Seq {
        self.fetcher.refresh()
    }

    /// Submits a validated deposit.
    pub fn deposit(&self, amount: DepositAmount) -> Seq {
        self.fetcher.deposit(amount)
    }
}

impl Drop for AccountSession {
    fn drop(&mut self) {
        // Release the lease first so the pool closes the connection now,
        // not whenever the aborted task is next polled.
        self.lease.take();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        info!(scope = ?self.fetcher.scope(), "Closed account session");
    }
}

/// Turns push events into UI messages for one scope.
async fn forward_push(mut receiver: PushReceiver, fetcher: Fetcher) {
    let scope = fetcher.scope().clone();
    let mut was_connected = receiver.status() == LinkStatus::Connected;
    if !fetcher.send(Message::Link {
        scope: scope.clone(),
        status: receiver.status(),
    }) {
        return;
    }

    while let Some(event) = receiver.next().await {
        let message = match event {
            PushEvent::Status(status) => {
                // Updates may have been missed while the link was down.
                if status == LinkStatus::Connected {
                    if was_connected {
                        fetcher.refresh();
                    }
                    was_connected = true;
                }
                Message::Link {
                    scope: scope.clone(),
                    status,
                }
            }
            PushEvent::Balance { message, payload } => Message::PushBalance {
                scope: scope.clone(),
                seq: fetcher.sequencer.next(),
                balance: message.balance,
                payload,
            },
            PushEvent::Refresh { payload } => {
                debug!(scope = ?scope, "Push signal, re-reading balance");
                fetcher.refresh();
                Message::PushSignal {
                    scope: scope.clone(),
                    payload,
                }
            }
            PushEvent::Lagged { skipped } => {
                debug!(scope = ?scope, skipped, "Push events dropped, re-reading balance");
                fetcher.refresh();
                continue;
            }
            PushEvent::Malformed { payload, reason } => {
                warn!(scope = ?scope, reason = %reason, "Malformed push payload");
                fetcher.refresh();
                Message::PushMalformed {
                    scope: scope.clone(),
                    payload,
                    reason,
                }
            }
        };

        if !fetcher.send(message) {
            return;
        }
    }
}

/// The set of open account sessions and the shared resources they use.
pub struct Sessions {
    config: AppConfig,
    client: BankClient,
    pool: ConnectionPool,
    sequencer: Arc<Sequencer>,
    tx: mpsc::UnboundedSender<Message>,
    open: HashMap<Scope, AccountSession>,
}

impl Sessions {
    /// Builds the shared client and connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: AppConfig, tx: mpsc::UnboundedSender<Message>) -> crate::Result<Self> {
        let client = BankClient::new(&config.backend)?;
        let pool = ConnectionPool::new(client.http().clone(), config.push.backoff);
        Ok(Self {
            config,
            client,
            pool,
            sequencer: Arc::new(Sequencer::new()),
            tx,
            open: HashMap::new(),
        })
    }

    /// Opens a session for the tab `tab` showing `scope`, unless one is
    /// already open.
    pub fn open(&mut self, scope: Scope, tab: TabId) {
        if self.open.contains_key(&scope) {
            return;
        }
        let fetcher = Fetcher::new(
            scope.clone(),
            tab,
            self.client.clone(),
            self.sequencer.clone(),
            self.tx.clone(),
        );
        let session = AccountSession::open(fetcher, &self.pool, &self.config);
        self.open.insert(scope, session);
    }

    /// Closes the session for `scope`, releasing its push subscription.
    pub fn close(&mut self, scope: &Scope) {
        self.open.remove(scope);
    }

    pub fn get(&self, scope: &Scope) -> Option<&AccountSession> {
        self.open.get(scope)
    }

    /// Number of open sessions.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// The shared connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Closes every session.
    pub fn close_all(&mut self) {
        self.open.clear();
    }
}
