//! Message protocol types and the message service boundary.
//!
//! This crate holds everything the tool runner needs to talk to a model
//! without knowing how the model is reached:
//!
//! - **Types**: conversation turns, content blocks, requests and responses.
//! - **Stream events**: the incremental form of a response.
//! - **MessageAccumulator**: folds stream events into a complete [`Message`].
//! - **MessageService**: the trait a transport implements.
//! - **MockService**: a scripted service for tests.

mod accumulator;
pub mod errors;
pub mod mock;
mod service;
pub mod stream;
pub mod types;

pub use accumulator::MessageAccumulator;
pub use errors::{AccumulateError, ServiceError};
pub use mock::{MockReply, MockService};
pub use service::{EventStream, MessageService};
pub use stream::{ApiErrorBody, ContentDelta, DeltaUsage, MessageDeltaBody, StreamEvent};
pub use types::{
    ContentBlock, ImageSource, Message, MessageParam, MessageRequest, Role, StopReason,
    ToolChoice, ToolDefinition, ToolResultBlock, ToolResultContent, ToolUseBlock, Usage,
};
