//! Authenticated controller session.
//!
//! [`Session`] couples the REST client, the event channel, and the
//! subscription table behind one cloneable handle. Two background tasks
//! keep the session alive:
//!
//! - the *login refresher* re-authenticates shortly before the token
//!   expires, reopens the event channel under the new token, and
//!   re-issues every subscription;
//! - the *subscription refresher* extends each subscription's lease on
//!   the controller every 45 seconds.
//!
//! Both are spawn-and-forget tasks tied to the session's
//! [`CancellationToken`]; [`Session::close`] tears everything down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::channel::{EventChannel, ReconnectConfig};
use crate::client::{ApicClient, ApicResponse, AuthInfo};
use crate::error::Error;
use crate::subscription::{self, SubscriptionState};
use crate::transport::{TlsMode, TransportConfig};

/// Margin subtracted from the token lifetime before re-login.
const LOGIN_REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// How often subscription leases are extended on the controller.
const SUBSCRIPTION_REFRESH_INTERVAL: Duration = Duration::from_secs(45);

// ── SessionConfig ────────────────────────────────────────────────────

/// Everything needed to open a session against a controller.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Controller root URL, e.g. `https://apic.example.com`.
    pub url: Url,
    /// Login name.
    pub login: String,
    /// Password; only exposed at the login call site.
    pub password: SecretString,
    /// Verify the controller's TLS certificate. Off by default --
    /// controllers in the field overwhelmingly run self-signed certs.
    pub verify_tls: bool,
    /// When false, `subscribe` is a silent no-op and no event channel
    /// is opened. For scripts that only read and push configuration.
    pub subscriptions_enabled: bool,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(url: Url, login: impl Into<String>, password: SecretString) -> Self {
        Self {
            url,
            login: login.into(),
            password,
            verify_tls: false,
            subscriptions_enabled: true,
            timeout: Duration::from_secs(30),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Mutable runtime state, guarded by one mutex so the REST surface,
/// the demux path, and the refresher tasks never race.
struct RuntimeState {
    auth: Option<AuthInfo>,
    subs: SubscriptionState,
    channel: Option<EventChannel>,
    frame_rx: Option<mpsc::UnboundedReceiver<Value>>,
}

struct SessionInner {
    client: ApicClient,
    config: SessionConfig,
    state: Mutex<RuntimeState>,
    cancel: CancellationToken,
    login_refresher_started: AtomicBool,
    sub_refresher_started: AtomicBool,
}

/// Cloneable handle to an authenticated controller session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Build a session. No network traffic happens until
    /// [`login`](Self::login) is called.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let tls = if config.verify_tls {
            TlsMode::System
        } else {
            TlsMode::DangerAcceptInvalid
        };
        let transport = TransportConfig {
            tls,
            timeout: config.timeout,
            cookie_jar: None,
        };
        let client = ApicClient::new(config.url.clone(), &transport)?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                client,
                config,
                state: Mutex::new(RuntimeState {
                    auth: None,
                    subs: SubscriptionState::new(),
                    channel: None,
                    frame_rx: None,
                }),
                cancel: CancellationToken::new(),
                login_refresher_started: AtomicBool::new(false),
                sub_refresher_started: AtomicBool::new(false),
            }),
        })
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        self.inner.client.base_url()
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate and start the login refresher.
    pub async fn login(&self) -> Result<AuthInfo, Error> {
        let auth = self
            .inner
            .client
            .login(&self.inner.config.login, &self.inner.config.password)
            .await?;

        {
            let mut state = self.inner.state.lock().await;
            state.auth = Some(auth.clone());
        }

        if !self.inner.login_refresher_started.swap(true, Ordering::SeqCst) {
            let session = self.clone();
            let cancel = self.inner.cancel.clone();
            tokio::spawn(async move {
                session.login_refresher(cancel).await;
            });
        }

        Ok(auth)
    }

    /// Whether a login has succeeded and not been torn down.
    pub async fn logged_in(&self) -> bool {
        self.inner.state.lock().await.auth.is_some()
    }

    // ── REST surface ─────────────────────────────────────────────────

    /// GET a controller-relative path and return the `imdata` records.
    pub async fn get(&self, path: &str) -> Result<Vec<Value>, Error> {
        self.inner.client.get(path).await
    }

    /// GET a controller-relative path and return the full envelope.
    pub async fn get_response(&self, path: &str) -> Result<ApicResponse, Error> {
        self.inner.client.get_response(path).await
    }

    /// POST a JSON body to a controller-relative path.
    pub async fn post(&self, path: &str, body: &Value) -> Result<(), Error> {
        self.inner.client.post(path, body).await
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to a query URL (one carrying `subscription=yes`).
    ///
    /// The reply's snapshot records are queued as synthetic events, so
    /// the first reads from [`get_event`](Self::get_event) replay
    /// current state before live changes arrive. Subscribing twice to
    /// the same URL is a no-op, as is any subscribe when the session
    /// was configured with `subscriptions_enabled: false`.
    pub async fn subscribe(&self, url: &str) -> Result<(), Error> {
        if !self.inner.config.subscriptions_enabled {
            debug!(url, "subscriptions disabled, ignoring subscribe");
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        if state.subs.is_subscribed(url) {
            return Ok(());
        }

        self.ensure_channel(&mut state)?;
        self.issue_subscribe(&mut state, url, true).await?;
        drop(state);

        if !self.inner.sub_refresher_started.swap(true, Ordering::SeqCst) {
            let session = self.clone();
            let cancel = self.inner.cancel.clone();
            tokio::spawn(async move {
                session.subscription_refresher(cancel).await;
            });
        }

        Ok(())
    }

    /// Whether this URL has an active subscription.
    pub async fn is_subscribed(&self, url: &str) -> bool {
        self.inner.state.lock().await.subs.is_subscribed(url)
    }

    /// Whether any events are queued for a subscribed URL.
    ///
    /// Drains the shared frame queue first, so events queued for other
    /// URLs land in their buckets as a side effect. A URL that was
    /// never subscribed simply has no events.
    pub async fn has_events(&self, url: &str) -> Result<bool, Error> {
        if !self.inner.config.subscriptions_enabled {
            return Ok(false);
        }

        let mut state = self.inner.state.lock().await;
        if !state.subs.is_subscribed(url) {
            return Ok(false);
        }
        Self::drain_frames(&mut state);
        Ok(state.subs.event_count(url) > 0)
    }

    /// Number of events queued for a subscribed URL; zero for a URL
    /// with no subscription.
    pub async fn get_event_count(&self, url: &str) -> Result<usize, Error> {
        let mut state = self.inner.state.lock().await;
        if !state.subs.is_subscribed(url) {
            return Ok(0);
        }
        Self::drain_frames(&mut state);
        Ok(state.subs.event_count(url))
    }

    /// Pop the oldest event for a subscribed URL.
    ///
    /// Never waits: an empty queue fails with [`Error::NoEvents`]
    /// immediately, so pollers pace themselves with
    /// [`has_events`](Self::has_events).
    pub async fn get_event(&self, url: &str) -> Result<Value, Error> {
        let mut state = self.inner.state.lock().await;
        if !state.subs.is_subscribed(url) {
            return Err(Error::NoSubscription { url: url.into() });
        }

        Self::drain_frames(&mut state);
        state
            .subs
            .pop_event(url)
            .ok_or_else(|| Error::NoEvents { url: url.into() })
    }

    /// Tear down one subscription on the controller and locally.
    pub async fn unsubscribe(&self, url: &str) -> Result<(), Error> {
        if !self.inner.config.subscriptions_enabled {
            return Ok(());
        }

        let mut state = self.inner.state.lock().await;
        if state.subs.remove(url).is_none() {
            return Err(Error::NoSubscription { url: url.into() });
        }

        // Last subscription gone: the channel has nothing left to carry.
        if state.subs.urls().is_empty() {
            if let Some(channel) = state.channel.take() {
                channel.close();
            }
            state.frame_rx = None;
        }
        drop(state);

        // Same query with subscription=no tells the controller to drop it.
        self.inner
            .client
            .get(&subscription::unsubscribe_url(url))
            .await?;
        Ok(())
    }

    /// Re-issue every active subscription, replacing the ids.
    ///
    /// Called after a re-login invalidates the old token (and with it
    /// the old subscription ids). Queued events are preserved.
    pub async fn resubscribe(&self) -> Result<(), Error> {
        let mut state = self.inner.state.lock().await;
        // Frames still in flight under the old ids must land in their
        // buckets before the ids are replaced, or demux drops them.
        Self::drain_frames(&mut state);
        for url in state.subs.urls() {
            if let Err(e) = self.issue_subscribe(&mut state, &url, false).await {
                warn!(url, error = %e, "resubscribe failed");
            }
        }
        Ok(())
    }

    /// Extend the lease of every active subscription.
    pub async fn refresh_subscriptions(&self) -> Result<(), Error> {
        let ids = {
            let state = self.inner.state.lock().await;
            state.subs.subscription_ids()
        };
        for id in ids {
            if let Err(e) = self.inner.client.get(&subscription::refresh_path(&id)).await {
                warn!(id, error = %e, "subscription refresh failed");
            }
        }
        Ok(())
    }

    /// Close the session: stop both refreshers and the event channel.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Issue the subscribe GET for one URL and record the new id.
    ///
    /// `queue_snapshot` controls whether the reply's records are queued
    /// as synthetic events; on resubscribe they are not, since the
    /// consumer already saw that state.
    async fn issue_subscribe(
        &self,
        state: &mut RuntimeState,
        url: &str,
        queue_snapshot: bool,
    ) -> Result<(), Error> {
        let resp = self.inner.client.get_response(url).await?;
        let id = resp.subscription_id.ok_or_else(|| Error::Subscribe {
            url: url.into(),
            message: "reply carried no subscriptionId".into(),
        })?;

        state.subs.record(url, id.clone());
        if queue_snapshot {
            state.subs.queue_snapshot(url, &id, &resp.imdata);
        }
        Ok(())
    }

    /// Open the event channel if it isn't already running.
    ///
    /// The channel counts as open once the reader task is spawned; the
    /// actual connect happens (and retries) in the background.
    fn ensure_channel(&self, state: &mut RuntimeState) -> Result<(), Error> {
        if state.channel.is_some() {
            return Ok(());
        }

        let token = state
            .auth
            .as_ref()
            .map(|a| a.token.clone())
            .ok_or_else(|| Error::Authentication {
                message: "subscribe requires a logged-in session".into(),
            })?;

        let ws_url = EventChannel::socket_url(self.inner.client.base_url(), &token)?;
        let (channel, frame_rx) = EventChannel::open(
            ws_url,
            ReconnectConfig::default(),
            self.inner.cancel.child_token(),
        );
        state.channel = Some(channel);
        state.frame_rx = Some(frame_rx);
        Ok(())
    }

    /// Move every frame waiting in the channel queue into its
    /// subscription bucket.
    fn drain_frames(state: &mut RuntimeState) {
        // Split-borrow the receiver and the table.
        let RuntimeState {
            subs,
            frame_rx: Some(rx),
            ..
        } = state
        else {
            return;
        };
        while let Ok(frame) = rx.try_recv() {
            subs.demux(&frame);
        }
    }

    /// Background task: re-login before the token expires, then swap
    /// the event channel to the new token and re-issue subscriptions.
    async fn login_refresher(self, cancel: CancellationToken) {
        loop {
            let ttl = {
                let state = self.inner.state.lock().await;
                state
                    .auth
                    .as_ref()
                    .map_or(Duration::ZERO, |a| a.refresh_timeout)
            };
            let sleep_for = ttl.saturating_sub(LOGIN_REFRESH_MARGIN);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }

            debug!("refreshing login");
            match self
                .inner
                .client
                .login(&self.inner.config.login, &self.inner.config.password)
                .await
            {
                Ok(auth) => {
                    let mut state = self.inner.state.lock().await;
                    state.auth = Some(auth.clone());

                    // The old token died with the old login, so the old
                    // channel URL is dead too. Drain it, then reopen.
                    if state.channel.take().is_some() {
                        Self::drain_frames(&mut state);
                        state.frame_rx = None;
                        if let Err(e) = self.ensure_channel(&mut state) {
                            warn!(error = %e, "failed to reopen event channel");
                        }
                    }
                    drop(state);

                    if let Err(e) = self.resubscribe().await {
                        warn!(error = %e, "resubscribe after login refresh failed");
                    }
                }
                Err(e) => {
                    // A dead login means a dead token; tear the session
                    // down rather than spin against a rejecting controller.
                    warn!(error = %e, "login refresh failed, closing session");
                    let mut state = self.inner.state.lock().await;
                    state.auth = None;
                    drop(state);
                    self.inner.cancel.cancel();
                    break;
                }
            }
        }

        debug!("login refresher exiting");
    }

    /// Background task: keep subscription leases alive.
    async fn subscription_refresher(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(SUBSCRIPTION_REFRESH_INTERVAL) => {}
            }

            if let Err(e) = self.refresh_subscriptions().await {
                warn!(error = %e, "subscription refresh sweep failed");
            }
        }

        debug!("subscription refresher exiting");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", self.inner.client.base_url())
            .field("login", &self.inner.config.login)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SUB_URL: &str = "/api/class/fvTenant.json?subscription=yes";

    async fn logged_in_session(server: &MockServer) -> Session {
        Mock::given(method("POST"))
            .and(path("/api/aaaLogin.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalCount": "1",
                "imdata": [{"aaaLogin": {"attributes": {
                    "token": "tok-1",
                    "refreshTimeoutSeconds": "600",
                }}}],
            })))
            .mount(server)
            .await;

        let config = SessionConfig::new(
            Url::parse(&server.uri()).unwrap(),
            "admin",
            SecretString::from("secret"),
        );
        let session = Session::new(config).unwrap();
        session.login().await.unwrap();
        session
    }

    // Frames read off the channel between two subscription ids belong
    // to the old id; resubscribe has to bank them before replacing it.
    #[tokio::test]
    async fn resubscribe_banks_in_flight_frames_before_replacing_ids() {
        let server = MockServer::start().await;
        let session = logged_in_session(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/class/fvTenant.json"))
            .and(query_param("subscription", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalCount": "0",
                "subscriptionId": "100",
                "imdata": [],
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/class/fvTenant.json"))
            .and(query_param("subscription", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalCount": "0",
                "subscriptionId": "200",
                "imdata": [],
            })))
            .mount(&server)
            .await;

        session.subscribe(SUB_URL).await.unwrap();

        // Swap in a frame queue the test controls and leave one frame
        // under the original id waiting on it.
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        {
            let mut state = session.inner.state.lock().await;
            state.frame_rx = Some(frame_rx);
        }
        frame_tx
            .send(json!({
                "totalCount": "1",
                "subscriptionId": ["100"],
                "imdata": [{"fvTenant": {"attributes": {"name": "live"}}}],
            }))
            .unwrap();

        session.resubscribe().await.unwrap();

        // The waiting frame was routed under id 100 before the id
        // became 200, so it is still retrievable afterwards.
        assert_eq!(session.get_event_count(SUB_URL).await.unwrap(), 1);
        let event = session.get_event(SUB_URL).await.unwrap();
        assert_eq!(event["imdata"][0]["fvTenant"]["attributes"]["name"], "live");
        session.close();
    }
}
