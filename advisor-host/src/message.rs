// Shared data model for one conversation: history messages, raw deltas,
// classified regions and tool call bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decoder::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool-result")]
    ToolResult,
}

/// One entry of the history handed to the model on every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chunk of model output. `is_final` marks end-of-turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDelta {
    pub text: String,
    pub is_final: bool,
}

impl StreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn last(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Thinking,
    Tool,
    Answer,
}

/// A fully delimited block from the model output. `text` is the inner
/// content between the opening and closing tag, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub kind: RegionKind,
    pub text: String,
}

impl Region {
    pub fn new(kind: RegionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A decoded tool request. `name` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// Normalized result of attempting one tool request.
///
/// `call` is `None` only when the tool region could not be decoded, in which
/// case no provider was ever contacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub call: Option<ToolCall>,
    pub ok: bool,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolOutcome {
    pub fn success(call: ToolCall, payload: impl Into<String>) -> Self {
        Self {
            call: Some(call),
            ok: true,
            payload: payload.into(),
            error_message: None,
        }
    }

    pub fn failure(call: ToolCall, message: impl Into<String>) -> Self {
        Self {
            call: Some(call),
            ok: false,
            payload: String::new(),
            error_message: Some(message.into()),
        }
    }

    pub fn rejected(error: &DecodeError) -> Self {
        Self {
            call: None,
            ok: false,
            payload: String::new(),
            error_message: Some(error.to_string()),
        }
    }

    pub fn tool_name(&self) -> &str {
        self.call.as_ref().map(|c| c.name.as_str()).unwrap_or("")
    }

    /// Text fed back to the model as a tool-result message.
    pub fn to_history_text(&self) -> String {
        match (&self.call, self.ok) {
            (Some(call), true) => format!("[{}] {}", call.name, self.payload),
            (Some(call), false) => format!(
                "[{}] error: {}",
                call.name,
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
            (None, _) => format!(
                "[rejected tool call] {}",
                self.error_message.as_deref().unwrap_or("malformed tool call")
            ),
        }
    }
}

/// Everything one full stream consumption produced.
///
/// `pending_tool_calls` keeps every tool region in arrival order; regions
/// that failed to decode stay in their slot so results line up with requests.
#[derive(Debug, Clone, Default)]
pub struct TurnResult {
    pub pending_tool_calls: Vec<Result<ToolCall, DecodeError>>,
    pub answer_region: Option<Region>,
    /// Unterminated output left in the tag buffer when the stream ended.
    pub raw_trailing: String,
    /// Raw model output for the turn, replayed into history as assistant text.
    pub assistant_text: String,
}

impl TurnResult {
    pub fn has_pending_tools(&self) -> bool {
        !self.pending_tool_calls.is_empty()
    }
}
