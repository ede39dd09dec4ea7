//! Prelude module for common imports.
//!
//! This module re-exports commonly used types and traits for convenience.
//!
//! # Usage
//!
//! ```ignore
//! use mcstash::prelude::*;
//! ```

// Error types
pub use crate::error::{
    ClientError, EnvelopeError, McStashError, ProtocolError, Result, SegmentError,
};

// Configuration
pub use crate::config::{ClientSettings, Options, Settings};

// Keys and envelopes
pub use crate::envelope::Envelope;
pub use crate::key::{CacheKey, generate_key, validate_segment_name};

// Connection
pub use crate::client::Client;
pub use crate::connection::Connection;

// Metrics
pub use crate::metrics::Metrics;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
