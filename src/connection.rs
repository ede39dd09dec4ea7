//! Connection manager: owns the memcached client and routes cache operations
//! through key naming and the value envelope.
//!
//! ```text
//! set:  value ─▶ envelope::encode ─▶ key::generate_key ─▶ client.set(key, payload, ttl secs)
//! get:  client.get(key) ─▶ envelope::decode ─▶ Envelope { item, stored, ttl }
//! ```
//!
//! `start` serialises on an internal lock, so concurrent callers run at most
//! one probe; whoever gets the lock second finds the client already in place.

use crate::client::Client;
use crate::config::{Options, Settings};
use crate::envelope::{self, Envelope};
use crate::error::{McStashError, Result, SegmentError};
use crate::key::{self, CacheKey};
use crate::metrics::Metrics;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Key fetched by the connect-time probe. Hit or miss both count as reachable.
const PROBE_KEY: &str = "foobar";

/// Cache connection to a single memcached server
pub struct Connection {
    settings: Settings,
    client: RwLock<Option<Arc<Client>>>,
    start_lock: tokio::sync::Mutex<()>,
    metrics: Arc<Metrics>,
}

impl Connection {
    /// Validate options and create an unstarted connection
    pub fn new(options: Options) -> Result<Self> {
        Self::with_settings(Settings::new(options)?)
    }

    /// Create an unstarted connection from validated settings
    pub fn with_settings(settings: Settings) -> Result<Self> {
        Ok(Self {
            settings,
            client: RwLock::new(None),
            start_lock: tokio::sync::Mutex::new(()),
            metrics: Arc::new(Metrics::new()?),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Probe the server and open the long-lived client. No-op when already started.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.start_lock.lock().await;

        if self.client.read().is_some() {
            return Ok(());
        }

        self.probe().await?;

        let client = Client::new(&self.settings.location, self.settings.client.clone());
        *self.client.write() = Some(Arc::new(client));
        info!("Connected to memcached at {}", self.settings.location);

        Ok(())
    }

    /// Issue one `get` on a throwaway single-socket client.
    ///
    /// The pooled client connects lazily, so this is the only place an
    /// unreachable server is detected at startup.
    async fn probe(&self) -> Result<()> {
        debug!("Probing memcached at {}", self.settings.location);

        let probe = Client::new(&self.settings.location, self.settings.client.probe());
        let result = probe.get(PROBE_KEY).await;
        probe.end();

        result.map(|_| ()).map_err(|e| {
            self.metrics.probe_failures.inc();
            warn!("Probe of {} failed: {}", self.settings.location, e);
            McStashError::Connection(e)
        })
    }

    /// Close the client if started. Never fails.
    pub fn stop(&self) {
        if let Some(client) = self.client.write().take() {
            client.end();
            info!("Disconnected from memcached at {}", self.settings.location);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.client.read().is_some()
    }

    /// See [`key::validate_segment_name`]
    pub fn validate_segment_name(&self, name: &str) -> std::result::Result<(), SegmentError> {
        key::validate_segment_name(name)
    }

    /// Raw protocol key for `key` under this connection's partition
    pub fn generate_key(&self, key: &CacheKey) -> String {
        key::generate_key(&self.settings.partition, &key.segment, &key.id)
    }

    /// Fetch an envelope. A miss is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<Envelope<T>>> {
        let client = self.client()?;
        self.metrics.cmd_get.inc();

        let raw_key = self.generate_key(key);
        trace!("get {}", raw_key);

        let payload = match client.get(&raw_key).await {
            Ok(Some(payload)) if !payload.is_empty() => payload,
            Ok(_) => {
                self.metrics.get_misses.inc();
                return Ok(None);
            }
            Err(e) => {
                self.metrics.client_errors.inc();
                return Err(e.into());
            }
        };

        self.metrics.get_hits.inc();
        match envelope::decode(&payload) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                self.metrics.envelope_errors.inc();
                Err(e.into())
            }
        }
    }

    /// Store `value` wrapped in an envelope for `ttl` milliseconds
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T, ttl: u64) -> Result<()> {
        let client = self.client()?;
        self.metrics.cmd_set.inc();

        let payload = envelope::encode(value, ttl)?;
        let raw_key = self.generate_key(key);
        trace!("set {} ({} bytes, ttl {}ms)", raw_key, payload.len(), ttl);

        client
            .set(&raw_key, payload.as_bytes(), ttl_seconds(ttl))
            .await
            .map_err(|e| {
                self.metrics.client_errors.inc();
                e.into()
            })
    }

    /// Delete a key. Deleting a missing key succeeds.
    pub async fn drop(&self, key: &CacheKey) -> Result<()> {
        let client = self.client()?;
        self.metrics.cmd_delete.inc();

        let raw_key = self.generate_key(key);
        trace!("delete {}", raw_key);

        match client.delete(&raw_key).await {
            Ok(_) => Ok(()),
            Err(e) => {
                self.metrics.client_errors.inc();
                Err(e.into())
            }
        }
    }

    fn client(&self) -> Result<Arc<Client>> {
        self.client.read().clone().ok_or(McStashError::NotStarted)
    }
}

/// Memcached expiry in whole seconds: `max(1, floor(ttl / 1000))`.
///
/// An exptime of 0 means "never expire" to memcached, so sub-second TTLs
/// are rounded up to one second.
pub fn ttl_seconds(ttl: u64) -> u32 {
    u32::try_from(ttl / 1000).unwrap_or(u32::MAX).max(1)
}
