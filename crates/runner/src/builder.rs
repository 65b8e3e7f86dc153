//! Runner construction.

use std::sync::Arc;

use messages::{MessageParam, MessageRequest, MessageService};

use crate::config::RunnerConfig;
use crate::state::RunnerCore;
use crate::tools::{Tool, ToolRegistry};
use crate::{Result, StreamingToolRunner, ToolRunner};

/// Builder for buffered and streaming runners.
///
/// The request's messages become the initial conversation. Its tool list
/// is replaced by the registered tools on every call.
pub struct RunnerBuilder {
    service: Arc<dyn MessageService>,
    request: MessageRequest,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: usize,
}

impl RunnerBuilder {
    /// Create a new builder with a service and request template.
    pub fn new(service: Arc<dyn MessageService>, request: MessageRequest) -> Self {
        Self {
            service,
            request,
            tools: Vec::new(),
            max_iterations: 0,
        }
    }

    /// Create a builder from loaded configuration.
    pub fn from_config(
        service: Arc<dyn MessageService>,
        config: &RunnerConfig,
        messages: Vec<MessageParam>,
    ) -> Self {
        Self::new(service, config.request(messages)).max_iterations(config.max_iterations)
    }

    /// Register a tool.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register several tools.
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Cap the number of model calls. Zero means unbounded.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Build a runner that makes whole-response calls.
    ///
    /// Fails if two tools share a name.
    pub fn build(self) -> Result<ToolRunner> {
        Ok(ToolRunner::new(self.into_core()?))
    }

    /// Build a runner that makes event-stream calls.
    ///
    /// Fails if two tools share a name.
    pub fn build_streaming(self) -> Result<StreamingToolRunner> {
        Ok(StreamingToolRunner::new(self.into_core()?))
    }

    fn into_core(self) -> Result<RunnerCore> {
        let registry = ToolRegistry::new(self.tools)?;
        Ok(RunnerCore::new(
            self.service,
            registry,
            self.request,
            self.max_iterations,
        ))
    }
}
