//! Server-sent events client.
//!
//! [`SseDecoder`] turns a `text/event-stream` byte stream into events
//! following the EventSource field rules (`data`, `event`, `id`, `retry`,
//! comment lines). [`run_event_source`] keeps a stream open with the same
//! reconnect-and-backoff behavior as the WebSocket feed, resending the
//! last seen event id.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::{debug, error, info, warn};

use crate::BankviewError;
use crate::push::{Backoff, Link, LinkStatus, PushEvent, Shutdown};

/// Default event type when no `event:` field is present.
const DEFAULT_EVENT: &str = "message";

/// Longest line kept, and the most data one event may accumulate.
/// Anything longer is discarded.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` parser.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// The current line outgrew [`MAX_LINE_BYTES`].
    line_overflow: bool,
    /// The previous chunk ended in `\r`; a leading `\n` belongs to it.
    after_cr: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    /// The pending event's data outgrew [`MAX_LINE_BYTES`].
    data_overflow: bool,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    ///
    /// Lines end in `\r\n`, `\n` or a lone `\r`.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if std::mem::take(&mut self.after_cr) && byte == b'\n' {
                continue;
            }
            match byte {
                b'\r' | b'\n' => {
                    self.after_cr = byte == b'\r';
                    if let Some(event) = self.end_line() {
                        events.push(event);
                    }
                }
                _ if self.buffer.len() < MAX_LINE_BYTES => self.buffer.push(byte),
                _ => self.line_overflow = true,
            }
        }
        events
    }

    /// Last `id:` value seen, sent back as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    fn end_line(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.line_overflow) {
            warn!(limit = MAX_LINE_BYTES, "Dropping overlong SSE line");
            return None;
        }
        self.process_line(&String::from_utf8_lossy(&line))
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.data.len() + value.len() >= MAX_LINE_BYTES {
                    self.data_overflow = true;
                } else {
                    if self.has_data {
                        self.data.push('\n');
                    }
                    self.data.push_str(value);
                }
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            other => debug!(field = other, "Ignoring unknown SSE field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        if std::mem::take(&mut self.data_overflow) {
            warn!(limit = MAX_LINE_BYTES, "Dropping oversized SSE event");
            self.data.clear();
            return None;
        }

        Some(SseEvent {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
        })
    }
}

/// Why a stream stopped.
enum DisconnectReason {
    ConnectionError,
    Shutdown,
}

/// Keeps an event stream open until shut down.
pub async fn run_event_source(
    client: reqwest::Client,
    url: String,
    link: Link,
    mut shutdown: Shutdown,
) {
    let mut backoff = Backoff::new(link.policy());
    let mut last_event_id: Option<String> = None;
    let mut first_attempt = true;

    loop {
        link.set_status(if first_attempt {
            LinkStatus::Connecting
        } else {
            LinkStatus::Reconnecting
        });
        first_attempt = false;

        info!(url = %url, "Opening event stream");
        let opened = tokio::select! {
            result = open(&client, &url, last_event_id.as_deref()) => result,
            () = shutdown.wait() => {
                link.set_status(LinkStatus::Closed);
                return;
            }
        };

        match opened {
            Ok(response) => {
                link.set_status(LinkStatus::Connected);
                backoff.reset();

                let mut decoder = SseDecoder::new();
                let reason = read_events(response, &mut decoder, &link, &mut shutdown).await;

                if let Some(id) = decoder.last_event_id() {
                    last_event_id = Some(id.to_string());
                }
                if let Some(retry) = decoder.retry() {
                    backoff.set_initial(retry);
                }

                if let DisconnectReason::Shutdown = reason {
                    info!(url = %url, "Event stream closed");
                    link.set_status(LinkStatus::Closed);
                    return;
                }
            }
            Err(e) => {
                error!(url = %url, "Event stream request failed: {e}");
            }
        }

        link.set_status(LinkStatus::Disconnected);
        let delay = backoff.next_delay();
        info!(
            backoff_ms = delay.as_millis() as u64,
            "Event stream lost, backing off"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = shutdown.wait() => {
                link.set_status(LinkStatus::Closed);
                return;
            }
        }
    }
}

/// Issues the streaming GET.
async fn open(
    client: &reqwest::Client,
    url: &str,
    last_event_id: Option<&str>,
) -> crate::Result<reqwest::Response> {
    let mut request = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BankviewError::status(status.as_u16(), &body));
    }
    Ok(response)
}

/// Reads chunks until the stream ends, errors, or shutdown fires.
async fn read_events(
    response: reqwest::Response,
    decoder: &mut SseDecoder,
    link: &Link,
    shutdown: &mut Shutdown,
) -> DisconnectReason {
    let stream = response.bytes_stream();
    tokio::pin!(stream);
    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in decoder.feed(&bytes) {
                            if event.event == DEFAULT_EVENT {
                                link.publish(PushEvent::from_event_source(&event.data));
                            } else {
                                debug!(event = %event.event, "Ignoring non-message SSE event");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Event stream error: {e}");
                        return DisconnectReason::ConnectionError;
                    }
                    None => {
                        warn!("Event stream ended");
                        return DisconnectReason::ConnectionError;
                    }
                }
            }

            () = shutdown.wait() => return DisconnectReason::Shutdown,
        }
    }
}
