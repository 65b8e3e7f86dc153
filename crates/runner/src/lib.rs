//! Tool runner: drives a model through multi-turn tool use.
//!
//! A run starts from a conversation and repeats one step until the model
//! answers without asking for tools:
//!
//! 1. Execute every tool use in the latest assistant turn, concurrently,
//!    and append one user turn holding the results in order.
//! 2. Call the model with the whole conversation and append its response.
//!
//! Tool failures are returned to the model as error-flagged results so it
//! can correct itself. Cancellation, model-call and stream failures are
//! returned to the caller.
//!
//! # Overview
//!
//! - **Tool**: a caller-supplied capability, see [`tools`].
//! - **ToolRunner**: steps with whole-response calls.
//! - **StreamingToolRunner**: steps with event-stream calls and hands each
//!   event to the caller as it arrives.
//! - **RunnerBuilder**: builds either runner from a service, a request
//!   template and tools.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use messages::{MessageParam, MessageRequest};
//! use runner::{RunnerBuilder, tools::{FunctionTool, ToolOutput}};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(service: Arc<dyn messages::MessageService>) -> runner::Result<()> {
//! let weather = FunctionTool::new(
//!     "get_weather",
//!     "Current weather for a city",
//!     serde_json::json!({"type": "object", "properties": {"city": {"type": "string"}}}),
//!     |input: serde_json::Value, _cancel| async move {
//!         Ok(ToolOutput::text(format!("Sunny in {}", input["city"])))
//!     },
//! );
//!
//! let request = MessageRequest::new("claude-sonnet-4-20250514", 1024)
//!     .message(MessageParam::user("What's the weather in Boston?"));
//! let mut runner = RunnerBuilder::new(service, request)
//!     .tool(Arc::new(weather))
//!     .max_iterations(10)
//!     .build()?;
//!
//! let answer = runner.run_to_completion(&CancellationToken::new()).await?;
//! println!("{}", answer.map(|m| m.text()).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod buffered;
mod builder;
pub mod config;
mod error;
mod state;
mod streaming;
pub mod tools;

pub use buffered::ToolRunner;
pub use builder::RunnerBuilder;
pub use config::{ConfigError, RunnerConfig};
pub use error::{Error, Result};
pub use state::RunState;
pub use streaming::{StreamingToolRunner, TurnCursor, TurnEvents};

// Cancellation token accepted by every runner operation.
pub use tokio_util::sync::CancellationToken;
