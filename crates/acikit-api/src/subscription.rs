//! Subscription bookkeeping and event demultiplexing.
//!
//! The controller multiplexes every subscription over one event channel;
//! each notification frame carries a `subscriptionId` list naming the
//! subscriptions it belongs to. This module keeps the URL ↔ id mapping
//! and the per-URL FIFO queues, and routes frames to their queues.
//!
//! All state here is synchronous; the [`Session`](crate::session::Session)
//! wraps it in a mutex and couples it to the HTTP client and the
//! event-channel reader task.

use std::collections::{HashMap, VecDeque};

use serde_json::{Value, json};
use tracing::debug;

/// Per-session subscription state: which URLs are subscribed, under
/// which ids, and which events are queued for each.
#[derive(Debug, Default)]
pub struct SubscriptionState {
    /// Subscribed URL → controller-assigned subscription id.
    ids: HashMap<String, String>,
    /// Subscribed URL → queued notification frames, oldest first.
    queues: HashMap<String, VecDeque<Value>>,
}

impl SubscriptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new (or renewed) subscription.
    ///
    /// On renewal the id is replaced but any queued events are kept --
    /// events received under the old id are still valid.
    pub fn record(&mut self, url: &str, subscription_id: String) {
        debug!(url, id = %subscription_id, "subscription recorded");
        self.ids.insert(url.to_owned(), subscription_id);
        self.queues.entry(url.to_owned()).or_default();
    }

    /// Forget a subscription and drop its queued events.
    pub fn remove(&mut self, url: &str) -> Option<String> {
        self.queues.remove(url);
        self.ids.remove(url)
    }

    /// Whether this URL has an active subscription.
    pub fn is_subscribed(&self, url: &str) -> bool {
        self.ids.contains_key(url)
    }

    /// The subscription id for a URL, if subscribed.
    pub fn id_for(&self, url: &str) -> Option<&str> {
        self.ids.get(url).map(String::as_str)
    }

    /// All subscribed URLs, for refresh and resubscribe sweeps.
    pub fn urls(&self) -> Vec<String> {
        self.ids.keys().cloned().collect()
    }

    /// All active subscription ids.
    pub fn subscription_ids(&self) -> Vec<String> {
        self.ids.values().cloned().collect()
    }

    /// Route one notification frame to the queue of every subscription
    /// named in its `subscriptionId` list.
    ///
    /// Frames for ids with no local subscription are dropped; that
    /// happens routinely for events that were in flight when an
    /// unsubscribe or resubscribe changed the id.
    pub fn demux(&mut self, frame: &Value) {
        let Some(ids) = frame.get("subscriptionId").and_then(Value::as_array) else {
            debug!("dropping frame without subscriptionId");
            return;
        };

        for id in ids.iter().filter_map(Value::as_str) {
            let url = self
                .ids
                .iter()
                .find(|(_, sid)| sid.as_str() == id)
                .map(|(url, _)| url.clone());

            match url {
                Some(url) => {
                    if let Some(queue) = self.queues.get_mut(&url) {
                        queue.push_back(frame.clone());
                    }
                }
                None => debug!(id, "dropping frame for unknown subscription id"),
            }
        }
    }

    /// Queue the records a subscribe reply returned as its snapshot.
    ///
    /// Each record is wrapped in a synthetic frame shaped exactly like a
    /// pushed notification, so consumers cannot tell initial state from
    /// later changes.
    pub fn queue_snapshot(&mut self, url: &str, subscription_id: &str, imdata: &[Value]) {
        let Some(queue) = self.queues.get_mut(url) else {
            return;
        };
        for record in imdata {
            queue.push_back(json!({
                "totalCount": "1",
                "subscriptionId": [subscription_id],
                "imdata": [record],
            }));
        }
    }

    /// Pop the oldest queued frame for a URL.
    pub fn pop_event(&mut self, url: &str) -> Option<Value> {
        self.queues.get_mut(url).and_then(VecDeque::pop_front)
    }

    /// Number of frames queued for a URL.
    pub fn event_count(&self, url: &str) -> usize {
        self.queues.get(url).map_or(0, VecDeque::len)
    }
}

// ── URL helpers ──────────────────────────────────────────────────────

/// Controller path that extends the lease on one subscription.
pub fn refresh_path(subscription_id: &str) -> String {
    format!("/api/subscriptionRefresh.json?id={subscription_id}")
}

/// Rewrite a subscribed URL into its unsubscribe form.
///
/// The controller tears a subscription down when the same query is
/// re-issued with `subscription=no`.
pub fn unsubscribe_url(url: &str) -> String {
    url.replace("subscription=yes", "subscription=no")
}

// ── Tests ────────────────────────────────────────────────────────────
