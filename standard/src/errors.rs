use std::fmt;

use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Failure while encoding/decoding an operation payload with a caller-supplied
/// [`MessageEncoder`](crate::traits::codec::MessageEncoder)/[`MessageDecoder`](crate::traits::codec::MessageDecoder).
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to encode request payload")]
    EncodeFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to decode response payload")]
    DecodeFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failure while encoding/decoding an envelope layer: the frame header, or
/// the nested service/command/query message carried inside it.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("response discriminator did not match request kind: expected {expected}, got {got}")]
    DiscriminatorMismatch { expected: &'static str, got: String },

    #[error("frame ({0} bytes) exceeds maximum allowed size ({1} bytes)")]
    FrameTooLarge(usize, usize),

    #[error(transparent)]
    Encoding(#[from] bincode::error::EncodeError),

    #[error(transparent)]
    Decoding(#[from] bincode::error::DecodeError),
}

/// Transport-level I/O failure.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("the write queue was closed")]
    WriteQueueClosed,
}

/// The operation kind on a request was neither `COMMAND` nor `QUERY`.
#[derive(Error, Debug)]
#[error("operation {operation_id:?} has unsupported kind {kind}")]
pub struct UnsupportedOperation {
    pub operation_id: String,
    pub kind: String,
}

/// A correlation id was registered while an entry for it was still pending,
/// which means the id generator handed out a duplicate.
#[derive(Error, Debug)]
#[error("correlation id {0} already has a pending entry")]
pub struct CorrelationIdInUse(pub u64);

/// The single error type returned across the request pipeline's module
/// boundaries. Every layer's local error enum is folded in here via `#[from]`,
/// so callers only ever need to match on one type.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The transport is absent or has already transitioned to `CLOSED`.
    /// Raised synchronously at the call boundary, never wrapped.
    #[error("transport is not connected")]
    NotConnected,

    /// An I/O-level failure occurred while writing to or reading from the
    /// transport.
    #[error("transport failure")]
    TransportFailure(#[source] TransportError),

    /// Decoding failed at some envelope layer, or a oneof discriminator
    /// mismatched the request kind.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] EnvelopeError),

    /// `op.kind` was outside `{COMMAND, QUERY}`.
    #[error(transparent)]
    UnsupportedOperation(#[from] UnsupportedOperation),

    /// The id generator produced a correlation id that still has a pending
    /// entry in the table.
    #[error(transparent)]
    CorrelationIdInUse(#[from] CorrelationIdInUse),

    /// The caller cancelled the pending awaitable (e.g. by dropping the
    /// returned future, or via an explicit cancellation handle).
    #[error("request was cancelled")]
    Cancelled,

    /// The server returned a tagged application-level error, distinct from
    /// an envelope-level decode failure. Surfaced to the caller verbatim.
    #[error("application error: {0}")]
    ApplicationError(String),

    /// Failure encoding/decoding the caller-supplied typed payload.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ClientError {
    pub fn transport(err: impl Into<TransportError>) -> Self {
        ClientError::TransportFailure(err.into())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::TransportFailure(TransportError::Io(err))
    }
}

/// A disconnect cause is threaded through `Correlator::fail_all` so every
/// drained pending entry observes the same `TransportFailure`.
#[derive(Clone)]
pub struct DisconnectCause(pub(crate) std::sync::Arc<str>);

impl DisconnectCause {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(std::sync::Arc::from(reason.into()))
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisconnectCause({})", self.0)
    }
}

impl From<DisconnectCause> for ClientError {
    fn from(cause: DisconnectCause) -> Self {
        ClientError::TransportFailure(TransportError::Io(std::io::Error::other(
            cause.to_string(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_operation_message() {
        let err = UnsupportedOperation {
            operation_id: "put".into(),
            kind: "INVALID_SENTINEL".into(),
        };
        assert_eq!(
            err.to_string(),
            "operation \"put\" has unsupported kind INVALID_SENTINEL"
        );
    }

    #[test]
    fn not_connected_never_wraps() {
        let err = ClientError::NotConnected;
        assert_eq!(err.to_string(), "transport is not connected");
    }
}
