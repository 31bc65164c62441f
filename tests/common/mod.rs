//! Shared test utilities: an in-process fake balance service.
//!
//! [`FakeBank`] serves the HTTP, WebSocket and SSE endpoints of the real
//! backend on a random local port and counts what it is asked to do.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::{Stream, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use bankview::config::{AppConfig, BackendConfig, PushConfig};
use bankview::push::{BackoffPolicy, PushEvent, PushMode, PushSubscription};
use bankview::tui::Message;

/// Balance of an account nobody has deposited to yet.
pub const STARTING_BALANCE: Decimal = dec!(42);

/// Account id whose balance route answers 404.
pub const MISSING_ACCOUNT: &str = "missing";

/// Account id whose balance route answers with a non-JSON body.
pub const GARBLED_ACCOUNT: &str = "garbled";

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// Backoff short enough for reconnect tests.
pub const FAST_BACKOFF: BackoffPolicy = BackoffPolicy {
    initial: Duration::from_millis(20),
    max: Duration::from_millis(100),
};

/// Behavior switches for the fake backend.
#[derive(Debug, Default, Clone)]
pub struct FakeOptions {
    /// The first WebSocket connection is closed by the server right away.
    pub close_first_websocket: bool,
    /// The first SSE stream ends after delivering one event.
    pub end_first_event_stream: bool,
    /// Delay before a deposit is answered.
    pub deposit_delay: Duration,
}

/// A push to fan out: the target account (`None` for all) and the payload.
type FeedItem = (Option<String>, String);

pub struct BankState {
    options: FakeOptions,
    global: Mutex<Decimal>,
    accounts: Mutex<HashMap<String, Decimal>>,
    feed: broadcast::Sender<FeedItem>,
    pub balance_reads: AtomicUsize,
    pub deposits: AtomicUsize,
    pub websocket_connections: AtomicUsize,
    pub websockets_open: AtomicUsize,
    pub event_streams: AtomicUsize,
    pub event_streams_open: Arc<AtomicUsize>,
    pub last_event_ids: Mutex<Vec<Option<String>>>,
    first_websocket_closed: AtomicBool,
}

/// A running fake backend. Stops when dropped.
pub struct FakeBank {
    pub addr: SocketAddr,
    pub state: Arc<BankState>,
    server: JoinHandle<()>,
}

impl FakeBank {
    pub async fn start() -> Self {
        Self::start_with(FakeOptions::default()).await
    }

    pub async fn start_with(options: FakeOptions) -> Self {
        let (feed, _) = broadcast::channel(64);
        let state = Arc::new(BankState {
            options,
            global: Mutex::new(STARTING_BALANCE),
            accounts: Mutex::new(HashMap::new()),
            feed,
            balance_reads: AtomicUsize::new(0),
            deposits: AtomicUsize::new(0),
            websocket_connections: AtomicUsize::new(0),
            websockets_open: AtomicUsize::new(0),
            event_streams: AtomicUsize::new(0),
            event_streams_open: Arc::new(AtomicUsize::new(0)),
            last_event_ids: Mutex::new(Vec::new()),
            first_websocket_closed: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/balance", get(global_balance))
            .route("/deposit/{amount}", post(global_deposit))
            .route("/account/{id}/balance", get(account_balance))
            .route("/account/{id}/deposit/{amount}", post(account_deposit))
            .route("/ws", get(shared_websocket))
            .route("/ws/{id}", get(scoped_websocket))
            .route("/events/{id}", get(event_stream))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake bank");
        let addr = listener.local_addr().expect("no local address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake bank failed");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Configuration pointing at this backend.
    pub fn config(&self, mode: PushMode) -> AppConfig {
        AppConfig {
            backend: BackendConfig {
                api_url: self.api_url(),
                request_timeout: Duration::from_secs(2),
            },
            push: PushConfig {
                mode,
                websocket_url: self.websocket_url(),
                shared_path: "/ws".to_string(),
                backoff: FAST_BACKOFF,
            },
            log_file: PathBuf::from("bankview-test.log"),
        }
    }

    /// Sends a raw payload to every open push channel that `target` reaches.
    pub fn push_raw(&self, target: Option<&str>, payload: &str) {
        let _ = self
            .state
            .feed
            .send((target.map(str::to_string), payload.to_string()));
    }

    /// Pushes a balance message for `account`.
    pub fn push_balance(&self, account: &str, balance: Decimal) {
        let payload = format!(r#"{{"account_id": "{account}", "balance": {balance}}}"#);
        self.push_raw(Some(account), &payload);
    }

    pub fn set_balance(&self, account: &str, balance: Decimal) {
        self.state
            .accounts
            .lock()
            .unwrap()
            .insert(account.to_string(), balance);
    }

    pub fn balance(&self, account: &str) -> Decimal {
        account_balance_of(&self.state, account)
    }

    pub fn set_global_balance(&self, balance: Decimal) {
        *self.state.global.lock().unwrap() = balance;
    }

    pub fn global_balance(&self) -> Decimal {
        *self.state.global.lock().unwrap()
    }

    pub fn balance_reads(&self) -> usize {
        self.state.balance_reads.load(Ordering::SeqCst)
    }

    pub fn deposits(&self) -> usize {
        self.state.deposits.load(Ordering::SeqCst)
    }

    pub fn websocket_connections(&self) -> usize {
        self.state.websocket_connections.load(Ordering::SeqCst)
    }

    pub fn websockets_open(&self) -> usize {
        self.state.websockets_open.load(Ordering::SeqCst)
    }

    pub fn event_streams(&self) -> usize {
        self.state.event_streams.load(Ordering::SeqCst)
    }

    pub fn event_streams_open(&self) -> usize {
        self.state.event_streams_open.load(Ordering::SeqCst)
    }

    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.state.last_event_ids.lock().unwrap().clone()
    }
}

impl Drop for FakeBank {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn account_balance_of(state: &BankState, account: &str) -> Decimal {
    state
        .accounts
        .lock()
        .unwrap()
        .get(account)
        .copied()
        .unwrap_or(STARTING_BALANCE)
}

fn balance_body(balance: Decimal) -> Response {
    let body = format!(r#"{{"balance": {balance}}}"#);
    ([("content-type", "application/json")], body).into_response()
}

async fn global_balance(State(state): State<Arc<BankState>>) -> Response {
    state.balance_reads.fetch_add(1, Ordering::SeqCst);
    balance_body(*state.global.lock().unwrap())
}

async fn global_deposit(
    State(state): State<Arc<BankState>>,
    Path(amount): Path<String>,
) -> Response {
    state.deposits.fetch_add(1, Ordering::SeqCst);
    let Ok(amount) = Decimal::from_str(&amount) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    *state.global.lock().unwrap() += amount;
    // The global variant acknowledges without a body.
    StatusCode::OK.into_response()
}

async fn account_balance(
    State(state): State<Arc<BankState>>,
    Path(id): Path<String>,
) -> Response {
    state.balance_reads.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        MISSING_ACCOUNT => (StatusCode::NOT_FOUND, "no such account").into_response(),
        GARBLED_ACCOUNT => "<html>oops</html>".into_response(),
        _ => balance_body(account_balance_of(&state, &id)),
    }
}

async fn account_deposit(
    State(state): State<Arc<BankState>>,
    Path((id, amount)): Path<(String, String)>,
) -> Response {
    state.deposits.fetch_add(1, Ordering::SeqCst);
    if !state.options.deposit_delay.is_zero() {
        tokio::time::sleep(state.options.deposit_delay).await;
    }
    let Ok(amount) = Decimal::from_str(&amount) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if amount <= Decimal::ZERO {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let balance = {
        let mut accounts = state.accounts.lock().unwrap();
        let balance = accounts.entry(id).or_insert(STARTING_BALANCE);
        *balance += amount;
        *balance
    };
    balance_body(balance)
}

async fn shared_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BankState>>,
) -> Response {
    ws.on_upgrade(move |socket| serve_websocket(socket, state, None))
}

async fn scoped_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BankState>>,
    Path(id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| serve_websocket(socket, state, Some(id)))
}

async fn serve_websocket(mut socket: WebSocket, state: Arc<BankState>, scope: Option<String>) {
    state.websocket_connections.fetch_add(1, Ordering::SeqCst);
    if state.options.close_first_websocket
        && !state.first_websocket_closed.swap(true, Ordering::SeqCst)
    {
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    }

    let mut feed = state.feed.subscribe();
    state.websockets_open.fetch_add(1, Ordering::SeqCst);
    loop {
        tokio::select! {
            item = feed.recv() => match item {
                Ok((target, payload)) => {
                    let reaches = scope.is_none() || target.is_none() || target == scope;
                    if reaches && socket.send(WsMessage::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    state.websockets_open.fetch_sub(1, Ordering::SeqCst);
}

/// Decrements the open stream counter when the response stream is dropped.
struct OpenStream(Arc<AtomicUsize>);

impl Drop for OpenStream {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn event_stream(
    State(state): State<Arc<BankState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let previous = state.event_streams.fetch_add(1, Ordering::SeqCst);
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.last_event_ids.lock().unwrap().push(last_event_id.clone());

    let feed = state.feed.subscribe();
    state.event_streams_open.fetch_add(1, Ordering::SeqCst);
    let guard = OpenStream(state.event_streams_open.clone());
    let first_id = last_event_id
        .and_then(|id| id.parse::<u64>().ok())
        .unwrap_or(0);
    let limit = if previous == 0 && state.options.end_first_event_stream {
        1
    } else {
        usize::MAX
    };

    let stream = futures_util::stream::unfold(
        (feed, guard, first_id),
        move |(mut feed, guard, mut next_id)| {
            let id = id.clone();
            async move {
                loop {
                    match feed.recv().await {
                        Ok((target, payload))
                            if target.is_none() || target.as_deref() == Some(id.as_str()) =>
                        {
                            next_id += 1;
                            let event = Event::default().id(next_id.to_string()).data(payload);
                            return Some((Ok(event), (feed, guard, next_id)));
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        },
    )
    .take(limit);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_millis(50)))
}

/// Polls `condition` until it holds, failing the test after [`WAIT`].
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Runs `future`, failing the test after [`WAIT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future)
        .await
        .expect("timed out")
}

/// Receives push events until `pick` accepts one.
pub async fn next_push<T>(
    subscription: &mut PushSubscription,
    mut pick: impl FnMut(PushEvent) -> Option<T>,
) -> T {
    within(async {
        loop {
            let event = subscription.next().await.expect("push connection ended");
            if let Some(value) = pick(event) {
                return value;
            }
        }
    })
    .await
}

/// Receives UI messages until `pick` accepts one.
pub async fn next_message<T>(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    mut pick: impl FnMut(Message) -> Option<T>,
) -> T {
    within(async {
        loop {
            let message = rx.recv().await.expect("message channel closed");
            if let Some(value) = pick(message) {
                return value;
            }
        }
    })
    .await
}
