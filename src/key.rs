//! Cache key naming and segment validation
//!
//! A raw memcached key is built from three independently percent-encoded
//! parts joined with `:`:
//!
//! ```text
//! <partition>:<segment>:<id>
//! ```
//!
//! Percent-encoding keeps whitespace and control bytes out of the key, which
//! the line-based ASCII protocol would otherwise treat as field delimiters.

use crate::error::SegmentError;

/// Logical cache key supplied by the caching layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub segment: String,
    pub id: String,
}

impl CacheKey {
    pub fn new(segment: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            id: id.into(),
        }
    }
}

/// Check that a segment name can be used in a raw key.
///
/// Run once when a segment is registered, not per operation.
pub fn validate_segment_name(name: &str) -> Result<(), SegmentError> {
    if name.is_empty() {
        return Err(SegmentError::Empty);
    }

    if name.contains('\0') {
        return Err(SegmentError::NullCharacter);
    }

    // Whitespace separates fields in memcached command lines
    if name.chars().any(char::is_whitespace) {
        return Err(SegmentError::Whitespace);
    }

    Ok(())
}

/// Build the raw protocol key for `(partition, segment, id)`
pub fn generate_key(partition: &str, segment: &str, id: &str) -> String {
    let partition = urlencoding::encode(partition);
    let segment = urlencoding::encode(segment);
    let id = urlencoding::encode(id);

    let mut key = String::with_capacity(partition.len() + segment.len() + id.len() + 2);
    key.push_str(&partition);
    key.push(':');
    key.push_str(&segment);
    key.push(':');
    key.push_str(&id);
    key
}
