//! WebSocket connection lifecycle management.
//!
//! [`run`] connects, forwards every text frame to the subscribers of its
//! [`Link`], reconnects with exponential backoff when the connection
//! drops, and sends a Close frame when its [`Shutdown`] fires.

use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};
use tungstenite::Message as WsMessage;

use super::{WsReader, WsWriter, connect};
use crate::push::{Backoff, Link, LinkStatus, PushEvent, Shutdown};

/// Why the reader loop exited.
enum DisconnectReason {
    /// The connection was lost, errored or closed by the server.
    ConnectionError,
    /// The last subscriber left.
    Shutdown,
}

/// Runs the connection loop until shut down.
pub async fn run(url: String, link: Link, mut shutdown: Shutdown) {
    let mut backoff = Backoff::new(link.policy());
    let mut first_attempt = true;

    loop {
        link.set_status(if first_attempt {
            LinkStatus::Connecting
        } else {
            LinkStatus::Reconnecting
        });
        first_attempt = false;

        info!(url = %url, "Connecting to push feed");
        let connected = tokio::select! {
            result = connect(&url) => result,
            () = shutdown.wait() => {
                link.set_status(LinkStatus::Closed);
                return;
            }
        };

        match connected {
            Ok((write, read)) => {
                link.set_status(LinkStatus::Connected);
                backoff.reset();

                match read_loop(write, read, &link, &mut shutdown).await {
                    DisconnectReason::Shutdown => {
                        info!(url = %url, "Push feed closed");
                        link.set_status(LinkStatus::Closed);
                        return;
                    }
                    DisconnectReason::ConnectionError => {}
                }
            }
            Err(e) => {
                error!(url = %url, "Push feed connection failed: {e}");
            }
        }

        link.set_status(LinkStatus::Disconnected);
        let delay = backoff.next_delay();
        info!(
            backoff_ms = delay.as_millis() as u64,
            "Push feed lost, backing off"
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

/// Reads frames until disconnection or shutdown.
async fn read_loop(
    mut write: WsWriter,
    mut read: WsReader,
    link: &Link,
    shutdown: &mut Shutdown,
) -> DisconnectReason {
    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        link.publish(PushEvent::from_websocket(text.as_str()));
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Server closed push feed");
                        return DisconnectReason::ConnectionError;
                    }
                    Some(Ok(_)) => {} // Binary/Ping/Pong frames
                    Some(Err(e)) => {
                        warn!("WebSocket error: {e}");
                        return DisconnectReason::ConnectionError;
                    }
                    None => {
                        warn!("WebSocket stream ended");
                        return DisconnectReason::ConnectionError;
                    }
                }
            }

            () = shutdown.wait() => {
                if let Err(e) = write.send(WsMessage::Close(None)).await {
                    warn!("Failed to send close frame: {e}");
                }
                let _ = write.close().await;
                return DisconnectReason::Shutdown;
            }
        }
    }
}
