//! Tool trait.

use async_trait::async_trait;
use messages::{ToolDefinition, ToolResultContent};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::ToolError;

/// Content produced by a successful tool execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: Vec<ToolResultContent>,
}

impl ToolOutput {
    /// Output holding a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(text)],
        }
    }

    /// Output holding `value` serialized as JSON text.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        let text = serde_json::to_string(value)
            .map_err(|e| ToolError::Execution(format!("serialize output: {e}")))?;
        Ok(Self::text(text))
    }

    pub fn from_content(content: Vec<ToolResultContent>) -> Self {
        Self { content }
    }
}

/// A named unit of work the model can invoke.
///
/// Tools are shared by reference for the whole run and may be executed
/// concurrently, including several calls to the same tool within one
/// dispatch.
///
/// # Example
///
/// ```ignore
/// struct Echo {
///     schema: Value,
/// }
///
/// #[async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn description(&self) -> &str {
///         "Echo back the raw input"
///     }
///
///     fn input_schema(&self) -> &Value {
///         &self.schema
///     }
///
///     async fn execute(
///         &self,
///         _cancel: CancellationToken,
///         input: &[u8],
///     ) -> Result<ToolOutput, ToolError> {
///         Ok(ToolOutput::text(String::from_utf8_lossy(input)))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool input.
    fn input_schema(&self) -> &Value;

    /// Run the tool on the raw JSON input.
    ///
    /// `cancel` is shared with every tool running in the same dispatch.
    /// Return [`ToolError::Cancelled`] to abort the dispatch; any other
    /// error is shown to the model.
    async fn execute(
        &self,
        cancel: CancellationToken,
        input: &[u8],
    ) -> Result<ToolOutput, ToolError>;

    /// Definition sent to the model with each request.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema().clone(),
        }
    }
}
