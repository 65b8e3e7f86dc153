use thiserror::Error;

/// Errors from the message service.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// The request never reached the service, or the connection dropped.
    #[error("network: {0}")]
    Network(String),

    /// The service answered with an error status.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The service response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors raised while folding stream events into a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AccumulateError {
    #[error("received {event} before message_start")]
    NotStarted { event: &'static str },

    #[error("received message_start twice")]
    AlreadyStarted,

    #[error("content block started at index {found}, expected {expected}")]
    OutOfOrderBlock { expected: usize, found: usize },

    #[error("no content block at index {0}")]
    UnknownBlock(usize),

    #[error("cannot apply {delta} to {block} block at index {index}")]
    DeltaMismatch {
        index: usize,
        block: &'static str,
        delta: &'static str,
    },

    #[error("invalid tool input JSON at index {index}: {message}")]
    InvalidToolInput { index: usize, message: String },

    #[error("stream error ({kind}): {message}")]
    Stream { kind: String, message: String },
}
