//! Value envelope stored in memcached in place of the raw value
//!
//! JSON format:
//!
//! ```text
//! {"item": <value>, "stored": <unix millis at write>, "ttl": <requested ttl millis>}
//! ```
//!
//! Decoding is two-step. The payload is first parsed as untyped JSON; a parse
//! failure or an empty/falsy result is [`EnvelopeError::BadContent`]. The
//! parsed value must then carry a truthy `item` and `stored`, and `item` must
//! deserialize into the caller's type, otherwise it is
//! [`EnvelopeError::IncorrectStructure`].

use crate::error::{EnvelopeError, McStashError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stored value with write metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The caller's value
    pub item: T,
    /// Write timestamp in milliseconds since the Unix epoch
    pub stored: u64,
    /// Requested time-to-live in milliseconds
    #[serde(default)]
    pub ttl: u64,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    item: &'a T,
    stored: u64,
    ttl: u64,
}

/// Serialize `value` into an envelope payload stamped with the current time
pub fn encode<T: Serialize + ?Sized>(value: &T, ttl: u64) -> Result<String, McStashError> {
    let envelope = EnvelopeRef {
        item: value,
        stored: current_millis(),
        ttl,
    };
    serde_json::to_string(&envelope).map_err(McStashError::Serialization)
}

/// Parse and validate an envelope payload
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<Envelope<T>, EnvelopeError> {
    let parsed = match serde_json::from_slice::<Value>(payload) {
        Ok(value) if is_truthy(&value) => value,
        _ => return Err(EnvelopeError::BadContent),
    };

    let has_field = |name: &str| parsed.get(name).is_some_and(is_truthy);
    if !has_field("item") || !has_field("stored") {
        return Err(EnvelopeError::IncorrectStructure);
    }

    serde_json::from_value(parsed).map_err(|_| EnvelopeError::IncorrectStructure)
}

/// Truthiness of a JSON value: null, false, 0, NaN and "" are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Current Unix time in milliseconds
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
