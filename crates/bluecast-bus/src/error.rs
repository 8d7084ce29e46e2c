//! Error types for the bus framework

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Transport-level failures reported by a [`BusConnection`](crate::BusConnection)
/// or by payload helpers.
#[derive(Error, Debug, Clone)]
pub enum BusError {
    #[error("bus unreachable: {0}")]
    Unreachable(String),

    #[error("call to {interface}.{method} failed: {reason}")]
    CallFailed {
        interface: String,
        method: String,
        reason: String,
    },

    #[error("remote replied with error {name}: {message}")]
    Remote { name: String, message: String },

    #[error("object path already registered: {0}")]
    PathInUse(String),

    #[error("object description rejected: {0}")]
    DescriptionRejected(String),

    #[error("signal subscription rejected: {0}")]
    SubscriptionRejected(String),

    #[error("malformed message body: {0}")]
    MalformedBody(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error("event loop is gone")]
    LoopGone,
}
