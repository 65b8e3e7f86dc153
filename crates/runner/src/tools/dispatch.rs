//! Concurrent execution of one assistant turn's tool uses.

use futures::future::join_all;
use messages::{MessageParam, ToolResultBlock, ToolUseBlock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::tools::{ToolError, ToolRegistry};
use crate::{Error, Result};

/// Execute every tool use in `turn` and build the tool-result turn.
///
/// Returns `Ok(None)` when the turn has no tool uses. Tool uses run
/// concurrently under one child scope of `cancel`; results keep the order
/// of the tool-use blocks. Unknown tools, unserializable input and tool
/// errors become error-flagged results. Cancellation aborts the whole
/// dispatch and no turn is produced.
pub async fn dispatch(
    registry: &ToolRegistry,
    turn: &MessageParam,
    cancel: &CancellationToken,
) -> Result<Option<MessageParam>> {
    let tool_uses = turn.tool_uses();
    if tool_uses.is_empty() {
        return Ok(None);
    }

    debug!(count = tool_uses.len(), "dispatching tool uses");
    let scope = cancel.child_token();
    let units = tool_uses
        .iter()
        .map(|tool_use| execute_tool_use(registry, tool_use, &scope));

    let results = tokio::select! {
        biased;
        _ = scope.cancelled() => return Err(Error::Cancelled),
        results = join_all(units) => results,
    };
    let results = results.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(Some(MessageParam::tool_results(results)))
}

async fn execute_tool_use(
    registry: &ToolRegistry,
    tool_use: &ToolUseBlock,
    scope: &CancellationToken,
) -> Result<ToolResultBlock> {
    if scope.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let Some(tool) = registry.get(&tool_use.name) else {
        warn!(tool = %tool_use.name, tool_use_id = %tool_use.id, "tool not found");
        return Ok(ToolResultBlock::error(
            &tool_use.id,
            format!("Tool '{}' not found", tool_use.name),
        ));
    };

    let input = match serde_json::to_vec(&tool_use.input) {
        Ok(input) => input,
        Err(e) => {
            warn!(tool = %tool_use.name, tool_use_id = %tool_use.id, error = %e, "failed to serialize tool input");
            return Ok(ToolResultBlock::error(
                &tool_use.id,
                format!("failed to serialize tool input: {e}"),
            ));
        }
    };

    match tool.execute(scope.clone(), &input).await {
        Ok(output) => {
            debug!(tool = %tool_use.name, tool_use_id = %tool_use.id, is_error = false, "tool finished");
            Ok(ToolResultBlock::success(&tool_use.id, output.content))
        }
        Err(ToolError::Cancelled) => {
            scope.cancel();
            Err(Error::Cancelled)
        }
        Err(_) if scope.is_cancelled() => Err(Error::Cancelled),
        Err(e) => {
            warn!(tool = %tool_use.name, tool_use_id = %tool_use.id, is_error = true, error = %e, "tool failed");
            Ok(ToolResultBlock::error(&tool_use.id, e.to_string()))
        }
    }
}
