//! # mcstash
//!
//! Memcached-backed storage adapter for a generic caching layer.
//!
//! Values are stored as JSON envelopes carrying the write time and the
//! requested TTL, under keys namespaced as `partition:segment:id`.
//!
//! ## Features
//!
//! - Connect-time reachability probe before the long-lived client is created
//! - Percent-encoded key namespacing and segment name validation
//! - Envelope validation that separates corrupt payloads from wrong shapes
//! - Millisecond TTLs floored to memcached's whole seconds (minimum 1)
//! - Pooled memcached ASCII client with timeouts, retries and dead-server backoff
//! - Prometheus counters per connection
//!
//! ## Example
//!
//! ```ignore
//! use mcstash::{CacheKey, Connection, Options};
//!
//! let conn = Connection::new(Options {
//!     location: Some("127.0.0.1:11211".to_string()),
//!     partition: "app".to_string(),
//!     ..Options::default()
//! })?;
//! conn.start().await?;
//!
//! let key = CacheKey::new("users", "42");
//! conn.set(&key, &serde_json::json!({"n": 1}), 60_000).await?;
//! let envelope = conn.get::<serde_json::Value>(&key).await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────────┐     ┌───────────┐
//! │ caching      │────▶│ Connection              │────▶│ memcached │
//! │ layer        │     │  ├─ key namer           │     │ server    │
//! │ (segments,   │     │  ├─ envelope codec      │     └───────────┘
//! │  policies)   │     │  └─ pooled ASCII client │
//! └──────────────┘     └─────────────────────────┘
//! ```

// Modules
pub mod client;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod key;
pub mod metrics;
pub mod prelude;
pub mod protocol;

// Re-exports for convenience
pub use config::{ClientSettings, Options, Settings};
pub use connection::Connection;
pub use envelope::Envelope;
pub use error::{ClientError, EnvelopeError, McStashError, ProtocolError, Result, SegmentError};
pub use key::{CacheKey, generate_key, validate_segment_name};
