//! Tools built from async closures.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::tools::{Tool, ToolError, ToolOutput};

type Handler<I> = Arc<
    dyn Fn(I, CancellationToken) -> BoxFuture<'static, Result<ToolOutput, ToolError>>
        + Send
        + Sync,
>;

/// A tool whose input is decoded into `I` before the handler runs.
///
/// Input that does not decode is rejected with
/// [`ToolError::InvalidInput`] without calling the handler.
pub struct FunctionTool<I> {
    name: String,
    description: String,
    input_schema: Value,
    handler: Handler<I>,
}

impl<I> FunctionTool<I>
where
    I: DeserializeOwned + Send + 'static,
{
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |input, cancel| Box::pin(handler(input, cancel))),
        }
    }
}

impl<I> std::fmt::Debug for FunctionTool<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<I> Tool for FunctionTool<I>
where
    I: DeserializeOwned + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    async fn execute(
        &self,
        cancel: CancellationToken,
        input: &[u8],
    ) -> Result<ToolOutput, ToolError> {
        let input: I =
            serde_json::from_slice(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        (self.handler)(input, cancel).await
    }
}
