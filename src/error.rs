//! Error types for conduit.

use crate::binding::ParameterType;
use crate::channels::SendOutcome;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Message construction errors.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message payload must not be null")]
    NullPayload,
}

/// Handler signature errors. Raised while building a binder; the handler
/// cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error(
        "Handler {handler}: could not find at most one message or payload parameter, ended up with candidates {candidates:?}"
    )]
    AmbiguousPayload {
        handler: String,
        candidates: Vec<String>,
    },

    #[error(
        "Handler {handler}: parameter {index} has a header marker without a name and no declared name to fall back on"
    )]
    UnnamedHeader { handler: String, index: usize },

    #[error(
        "Handler {handler}: parameter {index} is marked for bulk headers but is of type {found}, expected map or properties"
    )]
    BulkHeadersType {
        handler: String,
        index: usize,
        found: ParameterType,
    },

    #[error("Handler {handler}: more than one bulk headers parameter at {indices:?}")]
    MultipleBulkHeaders {
        handler: String,
        indices: Vec<usize>,
    },

    #[error("Handler {handler}: more than one message parameter at {indices:?}")]
    MultipleEnvelopes {
        handler: String,
        indices: Vec<usize>,
    },

    #[error("Handler {handler}: parameter {index} carries conflicting markers")]
    ConflictingMarkers { handler: String, index: usize },
}

/// Invocation-time binding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("Required header '{0}' not available")]
    MissingHeader(String),

    #[error("Message payload must not be null")]
    MissingPayload,

    #[error("No parameter available for message or payload")]
    MissingPayloadForOutbound,

    #[error("Wrong number of arguments: expected {expected}, received {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Argument {index} does not fit its slot, expected {expected}, got {actual}")]
    ArgumentMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} capacity must be greater than zero")]
    ZeroCapacity { name: String },
}

/// Router errors.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("A non-empty recipient list is required")]
    NoRecipients,

    #[error("Failed to send to recipient {channel}: {outcome}")]
    SendFailed {
        channel: String,
        outcome: SendOutcome,
    },
}

/// Endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Binding failed for handler {handler}: {source}")]
    Binding {
        handler: String,
        #[source]
        source: BindingError,
    },

    #[error("Handler {handler} failed: {reason}")]
    Handler { handler: String, reason: String },

    #[error("Reply from handler {handler} not sent to {channel}: {outcome}")]
    ReplyNotSent {
        handler: String,
        channel: String,
        outcome: SendOutcome,
    },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
