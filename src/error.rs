//! Error types for the manager client

use std::io;
use thiserror::Error;

/// Result alias used across the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors raised by the manager connection.
///
/// Application-level failures (a `Response: Error` from the peer) are not
/// errors here: they come back as ordinary [`AmiMessage`](crate::AmiMessage)s
/// unless the caller opts in with
/// [`AmiMessage::into_result`](crate::AmiMessage::into_result).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// TCP connect failed.
    #[error("unable to connect to manager {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete in time.
    #[error("connect to {address} timed out after {timeout_ms}ms")]
    ConnectTimeout { address: String, timeout_ms: u64 },

    /// `host:port` string with an unusable port.
    #[error("invalid manager address: {address}")]
    InvalidAddress { address: String },

    /// Writing a request to the socket failed.
    #[error("error writing to manager socket: {0}")]
    Write(#[source] io::Error),

    /// Reading from the socket failed before a frame was complete.
    #[error("error reading from manager socket: {0}")]
    FrameRead(#[source] io::Error),

    /// The peer closed the connection while a frame was expected.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer closed the connection before sending its banner line.
    #[error("manager banner not received")]
    BannerMissing,

    /// The login response did not carry `Response: Success`.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// A partial frame grew past the buffer limit.
    #[error("receive buffer holds {size} bytes without a frame terminator (limit {limit})")]
    BufferOverflow { size: usize, limit: usize },

    /// An action name, field name or value contains CR or LF.
    #[error("{context} must not contain line breaks")]
    InvalidField { context: String },

    /// A known action was invoked without one of its required fields.
    #[error("action {action} requires field {field}")]
    MissingField { action: String, field: String },

    /// A handler is already registered for this event name.
    #[error("{event} handler is already defined")]
    HandlerAlreadyRegistered { event: String },

    /// No handler is registered for this event name.
    #[error("{event} handler is not defined")]
    HandlerNotRegistered { event: String },

    /// The peer answered an action with a non-success status.
    #[error("action failed: {message}")]
    ActionFailed { message: String },
}

impl AmiError {
    pub(crate) fn auth_failed(message: impl Into<String>) -> Self {
        AmiError::AuthenticationFailed {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_field(context: impl Into<String>) -> Self {
        AmiError::InvalidField {
            context: context.into(),
        }
    }

    /// Whether the error leaves the connection unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AmiError::Connect { .. }
                | AmiError::ConnectTimeout { .. }
                | AmiError::Write(_)
                | AmiError::FrameRead(_)
                | AmiError::ConnectionClosed
                | AmiError::BannerMissing
                | AmiError::BufferOverflow { .. }
        )
    }
}
