// APIC HTTP client
//
// Wraps `reqwest::Client` with APIC-specific URL construction and
// `imdata` envelope unwrapping. The session layer (login refresh,
// subscriptions) is built on top of this in `session.rs`; this module
// stays focused on transport mechanics.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Result of a successful `aaaLogin` or `aaaRefresh` exchange.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// The session token, used to build the event-channel URL.
    pub token: String,
    /// How long the token stays valid before a refresh is needed.
    pub refresh_timeout: Duration,
}

/// A parsed APIC reply: the `imdata` list plus the envelope fields the
/// subscription layer needs.
#[derive(Debug, Clone)]
pub struct ApicResponse {
    /// Records returned by the query.
    pub imdata: Vec<Value>,
    /// Total record count reported by the controller.
    pub total_count: u64,
    /// Subscription id, present when the query carried `subscription=yes`.
    pub subscription_id: Option<String>,
}

/// Raw HTTP client for the APIC REST API.
///
/// Handles the `{ totalCount, imdata: [...] }` envelope and in-band
/// errors (`imdata[0].error.attributes`). All methods return unwrapped
/// payloads -- the envelope is stripped before the caller sees it.
pub struct ApicClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApicClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (the controller sets the auth token as a session
    /// cookie alongside the reply body). The `base_url` should be the
    /// controller root, e.g. `https://apic.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let http = config.build_client()?;
        Ok(Self { http, base_url })
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Resolve a controller-relative path (e.g. `/api/mo/uni.json`)
    /// against the base URL, preserving any query string.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate against `/api/aaaLogin.json`.
    ///
    /// Returns the token and its validity window. The session cookie is
    /// captured by the shared jar, so subsequent requests on this client
    /// are authenticated automatically.
    pub async fn login(&self, login: &str, password: &SecretString) -> Result<AuthInfo, Error> {
        let url = self.api_url("/api/aaaLogin.json")?;
        debug!("POST {url}");

        let body = json!({
            "aaaUser": {
                "attributes": {
                    "name": login,
                    "pwd": password.expose_secret(),
                }
            }
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        if !resp.status().is_success() {
            return Err(Error::Authentication {
                message: format!("login rejected with status {}", resp.status()),
            });
        }

        let parsed = Self::parse_envelope(resp).await?;
        Self::auth_info(&parsed, "aaaLogin")
    }

    /// Extend the current session via `/api/aaaRefresh.json`.
    pub async fn refresh_login(&self) -> Result<AuthInfo, Error> {
        let url = self.api_url("/api/aaaRefresh.json")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        if resp.status() == reqwest::StatusCode::FORBIDDEN
            || resp.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(Error::Authentication {
                message: "session token expired".into(),
            });
        }

        let parsed = Self::parse_envelope(resp).await?;
        Self::auth_info(&parsed, "aaaRefresh")
    }

    fn auth_info(resp: &ApicResponse, class: &str) -> Result<AuthInfo, Error> {
        let attrs = resp
            .imdata
            .first()
            .and_then(|rec| rec.get(class))
            .and_then(|obj| obj.get("attributes"))
            .ok_or_else(|| Error::Authentication {
                message: format!("reply carried no {class} record"),
            })?;

        let token = attrs
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Authentication {
                message: "reply carried no token".into(),
            })?
            .to_owned();

        let timeout_secs = attrs
            .get("refreshTimeoutSeconds")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(600);

        Ok(AuthInfo {
            token,
            refresh_timeout: Duration::from_secs(timeout_secs),
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET and return the unwrapped `imdata` records.
    pub async fn get(&self, path: &str) -> Result<Vec<Value>, Error> {
        Ok(self.get_response(path).await?.imdata)
    }

    /// Send a GET and return the full parsed envelope.
    ///
    /// The subscription layer needs `subscriptionId` alongside `imdata`,
    /// so this variant keeps the envelope fields.
    pub async fn get_response(&self, path: &str) -> Result<ApicResponse, Error> {
        let url = self.api_url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        Self::parse_envelope(resp).await
    }

    /// Send a POST with JSON body and verify the controller accepted it.
    pub async fn post(&self, path: &str, body: &Value) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("POST {url} {body}");

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_envelope(resp).await.map(|_| ())
    }

    /// Parse the `{ totalCount, imdata }` envelope, surfacing in-band
    /// errors (`imdata[0].error.attributes.text`) and auth failures.
    async fn parse_envelope(resp: reqwest::Response) -> Result<ApicResponse, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "session expired or invalid credentials".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        debug!("reply {status}: {body}");

        let parsed: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

        let imdata: Vec<Value> = parsed
            .get("imdata")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| Error::Deserialization {
                message: "reply carried no imdata list".into(),
                body: body.clone(),
            })?;

        // Controller errors arrive in-band as an `error` record.
        if let Some(err_attrs) = imdata
            .first()
            .and_then(|rec| rec.get("error"))
            .and_then(|e| e.get("attributes"))
        {
            let code = err_attrs.get("code").and_then(Value::as_str).unwrap_or("?");
            let text = err_attrs
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(Error::Api {
                code: code.to_owned(),
                message: text.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(Error::Api {
                code: status.as_str().to_owned(),
                message: format!("request failed with status {status}"),
            });
        }

        let total_count = parsed
            .get("totalCount")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(imdata.len() as u64);

        let subscription_id = parsed
            .get("subscriptionId")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(ApicResponse {
            imdata,
            total_count,
            subscription_id,
        })
    }
}
