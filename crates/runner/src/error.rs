use messages::{AccumulateError, ServiceError};
use thiserror::Error;

/// Errors surfaced by the tool runner.
///
/// Tool failures never appear here: they are returned to the model as
/// error-flagged tool results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller's cancellation token fired during dispatch or a model call.
    #[error("cancelled")]
    Cancelled,

    /// The model call for this iteration failed.
    #[error("model call failed at iteration {iteration}: {source}")]
    Model {
        iteration: usize,
        source: ServiceError,
    },

    /// The event stream for this iteration failed after it was opened.
    #[error("event stream failed at iteration {iteration}: {source}")]
    Stream {
        iteration: usize,
        source: ServiceError,
    },

    /// A stream event could not be folded into the response.
    #[error(transparent)]
    Accumulate(#[from] AccumulateError),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
