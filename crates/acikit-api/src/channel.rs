//! Event channel with auto-reconnect.
//!
//! Connects to the controller's WebSocket endpoint (`/socket<token>`) and
//! streams raw notification frames through an unbounded
//! [`tokio::sync::mpsc`] channel in arrival order. Handles reconnection
//! with exponential backoff + jitter automatically.
//!
//! Frames are delivered undecoded as [`serde_json::Value`]; the
//! subscription layer routes each frame to its queue by `subscriptionId`.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventChannel ─────────────────────────────────────────────────────

/// Handle to a running event-channel reader task.
///
/// The channel is considered open once the task is spawned; the first
/// connection attempt happens asynchronously and failures are retried
/// in the background.
pub struct EventChannel {
    cancel: CancellationToken,
}

impl EventChannel {
    /// Build the WebSocket URL for a session token.
    ///
    /// `https://host` maps to `wss://host/socket<token>`, plain `http`
    /// to `ws`.
    pub fn socket_url(base_url: &Url, token: &str) -> Result<Url, Error> {
        let scheme = if base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        let host = base_url
            .host_str()
            .ok_or(Error::InvalidUrl(url::ParseError::EmptyHost))?;
        let authority = match base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        Ok(Url::parse(&format!("{scheme}://{authority}/socket{token}"))?)
    }

    /// Spawn the reader task and return the handle plus the frame queue.
    ///
    /// Returns immediately; the connection is established in the
    /// background and retried on failure per `reconnect`.
    pub fn open(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, frame_tx, reconnect, task_cancel).await;
        });

        (Self { cancel }, frame_rx)
    }

    /// Signal the reader task to shut down gracefully.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    frame_tx: mpsc::UnboundedSender<Value>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &frame_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("event channel disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event channel error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event channel reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("event channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single WebSocket connection, read frames until it drops.
///
/// The session token rides in the URL path, so no extra headers are
/// needed on the upgrade request.
async fn connect_and_read(
    url: &Url,
    frame_tx: &mpsc::UnboundedSender<Value>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting event channel");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("event channel connected");

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        forward_frame(&text, frame_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("event channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "event channel close frame received"
                            );
                        } else {
                            tracing::info!("event channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("event channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// Parse a text frame and forward it to the demux queue.
fn forward_frame(text: &str, frame_tx: &mpsc::UnboundedSender<Value>) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "discarding unparseable notification frame");
            return;
        }
    };

    // Send errors just mean the session is shutting down.
    let _ = frame_tx.send(frame);
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_https_maps_to_wss() {
        let base = Url::parse("https://apic.example.com").unwrap();
        let ws = EventChannel::socket_url(&base, "tok-abc").unwrap();
        assert_eq!(ws.as_str(), "wss://apic.example.com/sockettok-abc");
    }

    #[test]
    fn socket_url_keeps_port() {
        let base = Url::parse("http://127.0.0.1:8443").unwrap();
        let ws = EventChannel::socket_url(&base, "t").unwrap();
        assert_eq!(ws.as_str(), "ws://127.0.0.1:8443/sockett");
    }

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn forward_frame_delivers_parsed_json() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        forward_frame(
            r#"{"subscriptionId":["72057598349672449"],"imdata":[{"fvTenant":{"attributes":{"name":"t1"}}}]}"#,
            &tx,
        );

        let frame = rx.try_recv().unwrap();
        assert_eq!(frame["subscriptionId"][0], "72057598349672449");
    }

    #[test]
    fn forward_frame_drops_malformed_json() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

        forward_frame("not json at all", &tx);

        assert!(rx.try_recv().is_err());
    }
}
