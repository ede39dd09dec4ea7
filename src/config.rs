//! Configuration for mcstash

use crate::error::{McStashError, Result};
use serde::Deserialize;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 11211;

/// Raw construction options, as supplied by the caller or a config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Server host, combined with `port` (conflicts with `location`)
    pub host: Option<String>,

    /// Server port, combined with `host` (conflicts with `location`)
    pub port: Option<u16>,

    /// `host:port` endpoint
    pub location: Option<String>,

    /// Namespace prefix for every generated key
    pub partition: String,

    /// Client tuning, passed through to the memcached client
    #[serde(flatten)]
    pub client: ClientSettings,
}

/// Memcached client tuning
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Connect and per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Idle sockets older than this are closed (milliseconds)
    pub idle_ms: u64,

    /// Maximum number of pooled sockets
    pub pool_size: usize,

    /// Extra connect attempts before a request fails
    pub retries: u32,

    /// Consecutive failures tolerated before the server is marked dead
    pub failures: u32,

    /// How long a dead server is skipped before being retried (milliseconds)
    pub retry_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            idle_ms: 5000,
            pool_size: 10,
            retries: 5,
            failures: 5,
            retry_ms: 30_000,
        }
    }
}

impl ClientSettings {
    /// Conservative profile for the connect-time reachability probe
    pub fn probe(&self) -> Self {
        Self {
            timeout_ms: if self.timeout_ms == 0 { 1000 } else { self.timeout_ms },
            idle_ms: if self.idle_ms == 0 { 1000 } else { self.idle_ms },
            pool_size: 1,
            retries: 0,
            failures: 0,
            retry_ms: self.retry_ms,
        }
    }
}

/// Validated settings. Only `location` survives construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub location: String,
    pub partition: String,
    pub client: ClientSettings,
}

impl Settings {
    /// Validate options and resolve the server location
    pub fn new(options: Options) -> Result<Self> {
        let Options {
            host,
            port,
            location,
            partition,
            client,
        } = options;

        let location = match location {
            Some(_) if host.is_some() || port.is_some() => {
                return Err(McStashError::Config(
                    "Cannot specify both location and host/port when using memcached".to_string(),
                ));
            }
            Some(location) => location,
            None => format!(
                "{}:{}",
                host.as_deref().unwrap_or(DEFAULT_HOST),
                port.unwrap_or(DEFAULT_PORT)
            ),
        };

        Ok(Self {
            location,
            partition,
            client,
        })
    }
}

impl Options {
    /// Load options from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McStashError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&contents)
            .map_err(|e| McStashError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load options from environment variables or use defaults
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build options from `MCSTASH_*` variables returned by `var`
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(location) = var("MCSTASH_LOCATION") {
            options.location = Some(location);
        }

        if let Some(host) = var("MCSTASH_HOST") {
            options.host = Some(host);
        }

        if let Some(port) = var("MCSTASH_PORT")
            && let Ok(n) = port.parse()
        {
            options.port = Some(n);
        }

        if let Some(partition) = var("MCSTASH_PARTITION") {
            options.partition = partition;
        }

        if let Some(timeout) = var("MCSTASH_TIMEOUT_MS")
            && let Ok(n) = timeout.parse()
        {
            options.client.timeout_ms = n;
        }

        if let Some(idle) = var("MCSTASH_IDLE_MS")
            && let Ok(n) = idle.parse()
        {
            options.client.idle_ms = n;
        }

        if let Some(pool_size) = var("MCSTASH_POOL_SIZE")
            && let Ok(n) = pool_size.parse()
        {
            options.client.pool_size = n;
        }

        if let Some(retries) = var("MCSTASH_RETRIES")
            && let Ok(n) = retries.parse()
        {
            options.client.retries = n;
        }

        if let Some(failures) = var("MCSTASH_FAILURES")
            && let Ok(n) = failures.parse()
        {
            options.client.failures = n;
        }

        if let Some(retry) = var("MCSTASH_RETRY_MS")
            && let Ok(n) = retry.parse()
        {
            options.client.retry_ms = n;
        }

        options
    }
}
