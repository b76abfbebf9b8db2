//! Async client for the APIC data-center controller.
//!
//! This crate owns the session runtime: authentication with automatic
//! token refresh, the REST request surface with `imdata` envelope
//! unwrapping, and the WebSocket event channel with per-URL
//! subscription queues.
//!
//! The typed object model lives in `acikit-model`; this crate deals in
//! controller-relative URLs and raw [`serde_json::Value`] records.
//!
//! # Example
//!
//! ```rust,ignore
//! use acikit_api::{Session, SessionConfig};
//! use secrecy::SecretString;
//! use url::Url;
//!
//! let config = SessionConfig::new(
//!     Url::parse("https://apic.example.com")?,
//!     "admin",
//!     SecretString::from("password"),
//! );
//! let session = Session::new(config)?;
//! session.login().await?;
//!
//! let tenants = session.get("/api/node/class/fvTenant.json").await?;
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod session;
pub mod subscription;
pub mod transport;

pub use channel::{EventChannel, ReconnectConfig};
pub use client::{ApicClient, ApicResponse, AuthInfo};
pub use error::Error;
pub use session::{Session, SessionConfig};
pub use transport::{TlsMode, TransportConfig};
