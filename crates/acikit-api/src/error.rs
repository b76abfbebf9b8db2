use thiserror::Error;

/// Top-level error type for the `acikit-api` crate.
///
/// Covers every failure mode of the session runtime: authentication,
/// transport, subscriptions, and the event channel. `acikit-model` maps
/// these into its own error type where needed.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the token is no longer accepted.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The controller rejected the request with an in-band error record.
    #[error("Controller error {code}: {message}")]
    Api { code: String, message: String },

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Subscriptions ───────────────────────────────────────────────
    /// The controller rejected a subscribe request or the reply carried
    /// no subscription id.
    #[error("Subscription failed for {url}: {message}")]
    Subscribe { url: String, message: String },

    /// `get_event` was called for a URL that was never subscribed.
    #[error("No subscription exists for {url}")]
    NoSubscription { url: String },

    /// `get_event` found nothing queued; it never waits for a frame.
    #[error("No events queued for {url}")]
    NoEvents { url: String },

    // ── Event channel ───────────────────────────────────────────────
    /// The event channel task is gone (session closed).
    #[error("Event channel closed")]
    ChannelClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
