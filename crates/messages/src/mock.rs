//! Scripted message service for tests and demos.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use tokio::sync::Mutex;

use crate::errors::ServiceError;
use crate::service::{EventStream, MessageService};
use crate::stream::{ContentDelta, DeltaUsage, MessageDeltaBody, StreamEvent};
use crate::types::{ContentBlock, Message, MessageRequest, Role, StopReason, Usage};

const MOCK_MODEL: &str = "mock-model";

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with this response.
    Message(Message),
    /// Fail the request.
    Fail(ServiceError),
    /// Stream the first `after` events of the response, then fail.
    ///
    /// A buffered `create` fails immediately.
    FailMidStream {
        message: Message,
        after: usize,
        error: ServiceError,
    },
    /// Never answer.
    Pending,
}

/// A message service that returns pre-configured replies in order.
///
/// Every request is recorded. When the script runs out, requests fail with
/// [`ServiceError::InvalidResponse`].
#[derive(Clone, Default)]
pub struct MockService {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<MessageRequest>>>,
}

impl MockService {
    /// Create a mock that answers with these responses.
    pub fn new(responses: Vec<Message>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Message).collect())
    }

    /// Create a mock from an explicit script.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far.
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_reply(&self, request: &MessageRequest) -> Result<MockReply, ServiceError> {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ServiceError::InvalidResponse("mock script exhausted".into()))
    }
}

#[async_trait]
impl MessageService for MockService {
    async fn create(&self, request: &MessageRequest) -> Result<Message, ServiceError> {
        match self.next_reply(request).await? {
            MockReply::Message(message) => Ok(message),
            MockReply::Fail(error) | MockReply::FailMidStream { error, .. } => Err(error),
            MockReply::Pending => futures::future::pending().await,
        }
    }

    async fn create_stream(&self, request: &MessageRequest) -> Result<EventStream, ServiceError> {
        match self.next_reply(request).await? {
            MockReply::Message(message) => {
                Ok(Box::pin(stream::iter(message_events(&message).into_iter().map(Ok))))
            }
            MockReply::Fail(error) => Err(error),
            MockReply::FailMidStream {
                message,
                after,
                error,
            } => {
                let events = message_events(&message).into_iter().take(after).map(Ok);
                Ok(Box::pin(stream::iter(events.chain(std::iter::once(Err(error))))))
            }
            MockReply::Pending => Ok(Box::pin(
                stream::pending::<Result<StreamEvent, ServiceError>>(),
            )),
        }
    }
}

/// Build an assistant response from content blocks.
///
/// The stop reason is `tool_use` when any block is a tool use, `end_turn`
/// otherwise.
pub fn reply(content: Vec<ContentBlock>) -> Message {
    let stop_reason = if content.iter().any(|b| b.as_tool_use().is_some()) {
        StopReason::ToolUse
    } else {
        StopReason::EndTurn
    };
    Message {
        id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
        model: MOCK_MODEL.to_string(),
        role: Role::Assistant,
        content,
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
            ..Usage::default()
        },
    }
}

/// The event sequence that accumulates to `message`.
pub fn message_events(message: &Message) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::MessageStart {
        message: Message {
            content: Vec::new(),
            stop_reason: None,
            stop_sequence: None,
            usage: Usage {
                output_tokens: 0,
                ..message.usage
            },
            ..message.clone()
        },
    }];

    for (index, block) in message.content.iter().enumerate() {
        match block {
            ContentBlock::Text { text } => {
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlock::text(""),
                });
                if !text.is_empty() {
                    events.push(StreamEvent::ContentBlockDelta {
                        index,
                        delta: ContentDelta::TextDelta { text: text.clone() },
                    });
                }
            }
            ContentBlock::Thinking {
                thinking,
                signature,
            } => {
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlock::Thinking {
                        thinking: String::new(),
                        signature: String::new(),
                    },
                });
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::ThinkingDelta {
                        thinking: thinking.clone(),
                    },
                });
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::SignatureDelta {
                        signature: signature.clone(),
                    },
                });
            }
            ContentBlock::ToolUse(tool_use) => {
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: ContentBlock::tool_use(&tool_use.id, &tool_use.name, json!({})),
                });
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: ContentDelta::InputJsonDelta {
                        partial_json: tool_use.input.to_string(),
                    },
                });
            }
            ContentBlock::RedactedThinking { .. } | ContentBlock::ToolResult(_) => {
                events.push(StreamEvent::ContentBlockStart {
                    index,
                    content_block: block.clone(),
                });
            }
        }
        events.push(StreamEvent::ContentBlockStop { index });
    }

    events.push(StreamEvent::MessageDelta {
        delta: MessageDeltaBody {
            stop_reason: message.stop_reason,
            stop_sequence: message.stop_sequence.clone(),
        },
        usage: DeltaUsage {
            output_tokens: message.usage.output_tokens,
            ..DeltaUsage::default()
        },
    });
    events.push(StreamEvent::MessageStop);
    events
}
