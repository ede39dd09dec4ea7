//! Prometheus metrics for mcstash

use prometheus::{IntCounter, Registry};

/// Result of metric creation or registration
pub type MetricsResult<T> = Result<T, prometheus::Error>;

/// Per-connection metrics
pub struct Metrics {
    pub registry: Registry,

    // Operation counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_delete: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Error counters
    pub probe_failures: IntCounter,
    pub envelope_errors: IntCounter,
    pub client_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance with its own registry
    pub fn new() -> MetricsResult<Self> {
        let registry = Registry::new();

        let cmd_get = counter(&registry, "mcstash_cmd_get_total", "Total get operations")?;
        let cmd_set = counter(&registry, "mcstash_cmd_set_total", "Total set operations")?;
        let cmd_delete = counter(&registry, "mcstash_cmd_delete_total", "Total drop operations")?;

        let get_hits = counter(&registry, "mcstash_get_hits_total", "Total get hits")?;
        let get_misses = counter(&registry, "mcstash_get_misses_total", "Total get misses")?;

        let probe_failures = counter(
            &registry,
            "mcstash_probe_failures_total",
            "Connect-time probes that could not reach the server",
        )?;
        let envelope_errors = counter(
            &registry,
            "mcstash_envelope_errors_total",
            "Stored payloads rejected by envelope validation",
        )?;
        let client_errors = counter(
            &registry,
            "mcstash_client_errors_total",
            "Errors returned by the memcached client",
        )?;

        Ok(Self {
            registry,
            cmd_get,
            cmd_set,
            cmd_delete,
            get_hits,
            get_misses,
            probe_failures,
            envelope_errors,
            client_errors,
        })
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> MetricsResult<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}
