//! Tools, the tool registry and concurrent tool dispatch.

mod dispatch;
pub mod errors;
mod function;
mod registry;
mod tool;

pub use dispatch::dispatch;
pub use errors::ToolError;
pub use function::FunctionTool;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolOutput};
