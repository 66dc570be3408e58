//! Feed-side value, notification and error types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Handle of a monitored item within one feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemHandle(pub u32);

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Value carried by a notification.
///
/// Each signal documents which variant it expects; anything else is a
/// [`ValueMismatch`], never a silent cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    /// Boolean-coded bit.
    Boolean(bool),
    /// Single byte, used by controllers for digital inputs.
    Byte(u8),
    /// Integer counter (cycle-time ticks and the like).
    Integer(i64),
    /// Floating-point measurement.
    Double(f64),
}

impl SignalValue {
    /// Interpret the value as a bit: `Boolean` as-is, `Byte` with 0 = false.
    pub fn as_bit(&self) -> Result<bool, ValueMismatch> {
        match *self {
            SignalValue::Boolean(b) => Ok(b),
            SignalValue::Byte(v) => Ok(v != 0),
            other => Err(ValueMismatch::new("boolean or byte", other)),
        }
    }

    /// Interpret the value as an integer tick counter.
    pub fn as_ticks(&self) -> Result<i64, ValueMismatch> {
        match *self {
            SignalValue::Integer(v) => Ok(v),
            other => Err(ValueMismatch::new("integer", other)),
        }
    }

    /// Short variant name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalValue::Boolean(_) => "boolean",
            SignalValue::Byte(_) => "byte",
            SignalValue::Integer(_) => "integer",
            SignalValue::Double(_) => "double",
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Boolean(b) => write!(f, "{}", b),
            SignalValue::Byte(v) => write!(f, "{}", v),
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// A value arrived with a variant the receiving signal does not accept.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected} value, got {} ({actual})", .actual.kind())]
pub struct ValueMismatch {
    /// Accepted variant(s).
    pub expected: &'static str,
    /// What was actually received.
    pub actual: SignalValue,
}

impl ValueMismatch {
    pub fn new(expected: &'static str, actual: SignalValue) -> Self {
        Self { expected, actual }
    }
}

/// One routed sample of a monitored signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalNotification {
    /// Configured signal name (the monitored item's display name).
    pub signal_name: String,
    /// Sampled value.
    pub value: SignalValue,
    /// Timestamp assigned by the controller.
    pub source_timestamp: DateTime<Utc>,
}

impl SignalNotification {
    pub fn new(signal_name: impl Into<String>, value: SignalValue, source_timestamp: DateTime<Utc>) -> Self {
        Self {
            signal_name: signal_name.into(),
            value,
            source_timestamp,
        }
    }
}

/// Callback a subscription invokes for each monitored-item change.
pub type NotificationCallback = Arc<dyn Fn(ItemHandle, SignalValue, DateTime<Utc>) + Send + Sync>;

/// Errors reported by a feed implementation.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The connect primitive failed.
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// An operation needed a live connection.
    #[error("feed is not connected")]
    NotConnected,

    /// Creating or activating a subscription failed.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// The server rejected a monitored item.
    #[error("monitored item {node} rejected: {reason}")]
    MonitoredItem { node: String, reason: String },
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_interpretation() {
        assert_eq!(SignalValue::Byte(0).as_bit(), Ok(false));
        assert_eq!(SignalValue::Byte(3).as_bit(), Ok(true));
        assert_eq!(SignalValue::Boolean(true).as_bit(), Ok(true));

        let err = SignalValue::Integer(1).as_bit().unwrap_err();
        assert_eq!(err.expected, "boolean or byte");
        assert_eq!(err.to_string(), "expected boolean or byte value, got integer (1)");
    }

    #[test]
    fn test_ticks_reject_non_integers() {
        assert_eq!(SignalValue::Integer(50_000_000).as_ticks(), Ok(50_000_000));
        assert!(SignalValue::Double(1.5).as_ticks().is_err());
        assert!(SignalValue::Byte(1).as_ticks().is_err());
    }

    #[test]
    fn test_value_display_and_json() {
        assert_eq!(SignalValue::Boolean(false).to_string(), "false");
        assert_eq!(SignalValue::Double(2.5).to_string(), "2.5");
        assert_eq!(serde_json::to_string(&SignalValue::Integer(7)).unwrap(), "7");
    }
}
