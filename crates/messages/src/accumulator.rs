//! Folds stream events into a complete response.

use std::collections::HashMap;

use crate::errors::AccumulateError;
use crate::stream::{ContentDelta, StreamEvent};
use crate::types::{ContentBlock, Message};

/// Builds a [`Message`] from stream events, one event at a time.
///
/// Events must be fed in arrival order. After each call [`message`](Self::message)
/// reflects everything received so far; tool-use input is only parsed when
/// its block stops.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    message: Option<Message>,
    partial_json: HashMap<usize, String>,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The response built so far, if `message_start` has arrived.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Fold one event into the response.
    pub fn accumulate(&mut self, event: &StreamEvent) -> Result<(), AccumulateError> {
        match event {
            StreamEvent::MessageStart { message } => {
                if self.message.is_some() {
                    return Err(AccumulateError::AlreadyStarted);
                }
                self.message = Some(message.clone());
                return Ok(());
            }
            StreamEvent::Error { error } => {
                return Err(AccumulateError::Stream {
                    kind: error.kind.clone(),
                    message: error.message.clone(),
                });
            }
            StreamEvent::Ping => return Ok(()),
            _ => {}
        }

        let message = self
            .message
            .as_mut()
            .ok_or(AccumulateError::NotStarted {
                event: event.kind(),
            })?;

        match event {
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                if *index != message.content.len() {
                    return Err(AccumulateError::OutOfOrderBlock {
                        expected: message.content.len(),
                        found: *index,
                    });
                }
                message.content.push(content_block.clone());
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                let block = message
                    .content
                    .get_mut(*index)
                    .ok_or(AccumulateError::UnknownBlock(*index))?;
                match (block, delta) {
                    (ContentBlock::Text { text }, ContentDelta::TextDelta { text: more }) => {
                        text.push_str(more);
                    }
                    (
                        ContentBlock::Thinking { thinking, .. },
                        ContentDelta::ThinkingDelta { thinking: more },
                    ) => thinking.push_str(more),
                    (
                        ContentBlock::Thinking { signature, .. },
                        ContentDelta::SignatureDelta { signature: more },
                    ) => signature.push_str(more),
                    (ContentBlock::ToolUse(_), ContentDelta::InputJsonDelta { partial_json }) => {
                        self.partial_json
                            .entry(*index)
                            .or_default()
                            .push_str(partial_json);
                    }
                    (block, delta) => {
                        return Err(AccumulateError::DeltaMismatch {
                            index: *index,
                            block: block.kind(),
                            delta: delta.kind(),
                        });
                    }
                }
            }
            StreamEvent::ContentBlockStop { index } => {
                let block = message
                    .content
                    .get_mut(*index)
                    .ok_or(AccumulateError::UnknownBlock(*index))?;
                if let Some(json) = self.partial_json.remove(index) {
                    apply_tool_input(*index, block, &json)?;
                }
            }
            StreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    message.stop_reason = delta.stop_reason;
                }
                if delta.stop_sequence.is_some() {
                    message.stop_sequence = delta.stop_sequence.clone();
                }
                message.usage.output_tokens = usage.output_tokens;
                if let Some(input_tokens) = usage.input_tokens {
                    message.usage.input_tokens = input_tokens;
                }
                if usage.cache_creation_input_tokens.is_some() {
                    message.usage.cache_creation_input_tokens = usage.cache_creation_input_tokens;
                }
                if usage.cache_read_input_tokens.is_some() {
                    message.usage.cache_read_input_tokens = usage.cache_read_input_tokens;
                }
            }
            // message_start, error and ping were handled above.
            StreamEvent::MessageStop
            | StreamEvent::MessageStart { .. }
            | StreamEvent::Error { .. }
            | StreamEvent::Ping => {}
        }
        Ok(())
    }

    /// Finish accumulation and return the response.
    ///
    /// Tool input still buffered (no `content_block_stop` seen) is parsed here.
    pub fn finish(mut self) -> Result<Message, AccumulateError> {
        let mut message = self.message.take().ok_or(AccumulateError::NotStarted {
            event: "end of stream",
        })?;
        let mut pending: Vec<_> = self.partial_json.drain().collect();
        pending.sort_by_key(|(index, _)| *index);
        for (index, json) in pending {
            let block = message
                .content
                .get_mut(index)
                .ok_or(AccumulateError::UnknownBlock(index))?;
            apply_tool_input(index, block, &json)?;
        }
        Ok(message)
    }
}

fn apply_tool_input(
    index: usize,
    block: &mut ContentBlock,
    json: &str,
) -> Result<(), AccumulateError> {
    let ContentBlock::ToolUse(tool_use) = block else {
        return Ok(());
    };
    if json.trim().is_empty() {
        return Ok(());
    }
    tool_use.input =
        serde_json::from_str(json).map_err(|e| AccumulateError::InvalidToolInput {
            index,
            message: e.to_string(),
        })?;
    Ok(())
}
