use thiserror::Error;

/// Errors returned by a tool's `execute`.
///
/// Every variant except `Cancelled` is reported back to the model as an
/// error-flagged tool result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    Execution(String),
    /// The tool observed cancellation. Aborts the whole dispatch.
    #[error("cancelled")]
    Cancelled,
}
