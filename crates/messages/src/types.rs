//! Conversation, content and request types.
//!
//! Content blocks are tagged on their `type` field, so a block is decoded in
//! one step straight into its variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// Unique identifier used to correlate the result.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as JSON.
    pub input: Value,
}

/// Source of an image returned by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

/// One item of tool result content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Image { source: ImageSource },
}

impl ToolResultContent {
    /// Create a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Output of a tool execution, sent back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// ID of the tool-use block this result answers.
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Vec<ToolResultContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResultBlock {
    /// Create a successful result.
    pub fn success(tool_use_id: impl Into<String>, content: Vec<ToolResultContent>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: false,
        }
    }

    /// Create an error-flagged result carrying a single text message.
    pub fn error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: vec![ToolResultContent::text(message)],
            is_error: true,
        }
    }

    /// Combined text of all text items.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolResultContent::Text { text } => Some(text.as_str()),
                ToolResultContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A block of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String, signature: String },
    RedactedThinking { data: String },
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool-use block.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse(ToolUseBlock {
            id: id.into(),
            name: name.into(),
            input,
        })
    }

    /// The wire name of this block's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::RedactedThinking { .. } => "redacted_thinking",
            Self::ToolUse(_) => "tool_use",
            Self::ToolResult(_) => "tool_result",
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            Self::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            Self::ToolResult(result) => Some(result),
            _ => None,
        }
    }
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn tool_uses(blocks: &[ContentBlock]) -> Vec<&ToolUseBlock> {
    blocks.iter().filter_map(ContentBlock::as_tool_use).collect()
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParam {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl MessageParam {
    /// Create a turn with a role and text content.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create a user turn with text.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant turn with text.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Create a turn from blocks.
    pub fn from_blocks(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Create a user turn holding tool results.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// Add a block to this turn.
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    /// Get combined text content.
    pub fn text(&self) -> String {
        join_text(&self.content)
    }

    /// Extract all tool-use blocks, in order.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        tool_uses(&self.content)
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(|b| b.as_tool_use().is_some())
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    PauseTurn,
    Refusal,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
}

impl Usage {
    /// Input plus output tokens, saturating at `u32::MAX`.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A complete model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub model: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl Message {
    /// Convert into the turn appended to the conversation.
    pub fn to_param(&self) -> MessageParam {
        MessageParam {
            role: self.role,
            content: self.content.clone(),
        }
    }

    /// Get combined text content.
    pub fn text(&self) -> String {
        join_text(&self.content)
    }

    /// Extract all tool-use blocks, in order.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        tool_uses(&self.content)
    }
}

/// Tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool input.
    pub input_schema: Value,
}

/// How the model should choose tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides whether to use tools.
    #[default]
    Auto,
    /// Model must use some tool.
    Any,
    /// Model cannot use tools.
    None,
    /// Model must use the named tool.
    Tool { name: String },
}

/// Everything needed for one model request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<MessageParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl MessageRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages: Vec::new(),
            system: None,
            tools: Vec::new(),
            tool_choice: None,
            temperature: None,
            stop_sequences: Vec::new(),
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Append a turn to the request conversation.
    pub fn message(mut self, message: MessageParam) -> Self {
        self.messages.push(message);
        self
    }

    /// Replace the request conversation.
    pub fn messages(mut self, messages: Vec<MessageParam>) -> Self {
        self.messages = messages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_text_extraction() {
        let turn = MessageParam::from_blocks(
            Role::Assistant,
            vec![
                ContentBlock::text("Hello "),
                ContentBlock::tool_use("1", "test", Value::Null),
                ContentBlock::text("world"),
            ],
        );
        assert_eq!(turn.text(), "Hello world");
    }

    #[test]
    fn turn_tool_use_extraction() {
        let turn = MessageParam::assistant("Let me help")
            .with_block(ContentBlock::tool_use("1", "search", json!("query")))
            .with_block(ContentBlock::tool_use("2", "read", json!("file")));
        let uses = turn.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].name, "search");
        assert_eq!(uses[1].name, "read");
        assert!(turn.has_tool_use());
        assert!(!MessageParam::user("hi").has_tool_use());
    }

    #[test]
    fn content_block_decodes_by_type_tag() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "hi"},
            {"type": "tool_use", "id": "t1", "name": "get_weather", "input": {"city": "Boston"}},
            {"type": "tool_result", "tool_use_id": "t1", "content": [{"type": "text", "text": "sunny"}]},
            {"type": "thinking", "thinking": "hmm", "signature": "sig"}
        ]))
        .unwrap();

        assert_eq!(blocks[0], ContentBlock::text("hi"));
        let tool_use = blocks[1].as_tool_use().unwrap();
        assert_eq!(tool_use.input["city"], "Boston");
        let result = blocks[2].as_tool_result().unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "sunny");
        assert_eq!(blocks[3].kind(), "thinking");
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        let result = serde_json::from_value::<ContentBlock>(json!({"type": "hologram"}));
        assert!(result.is_err());
    }

    #[test]
    fn error_result_serializes_flag() {
        let value = serde_json::to_value(ContentBlock::ToolResult(ToolResultBlock::error(
            "t2", "boom",
        )))
        .unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["is_error"], true);

        let ok = serde_json::to_value(ToolResultBlock::success("t1", vec![])).unwrap();
        assert!(ok.get("is_error").is_none());
    }

    #[test]
    fn response_converts_to_turn() {
        let message = Message {
            id: "msg_1".into(),
            model: "m".into(),
            role: Role::Assistant,
            content: vec![ContentBlock::text("done")],
            stop_reason: Some(StopReason::EndTurn),
            stop_sequence: None,
            usage: Usage::default(),
        };
        let turn = message.to_param();
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.text(), "done");
    }

    #[test]
    fn request_skips_empty_optionals() {
        let request = MessageRequest::new("m", 1024).message(MessageParam::user("hi"));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("system").is_none());
        assert_eq!(value["messages"][0]["role"], "user");

        let choice = serde_json::to_value(ToolChoice::Tool { name: "x".into() }).unwrap();
        assert_eq!(choice, json!({"type": "tool", "name": "x"}));
    }

    #[test]
    fn usage_total_tokens() {
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 50,
            ..Usage::default()
        };
        assert_eq!(usage.total_tokens(), 150);
    }

    #[test]
    fn usage_total_tokens_saturates() {
        let usage = Usage {
            input_tokens: u32::MAX,
            output_tokens: 1,
            ..Usage::default()
        };
        assert_eq!(usage.total_tokens(), u32::MAX);
    }
}
