use crate::message::{ConversationMessage, Role, ToolOutcome};

/// Ordered, append-only history of one conversation.
///
/// Only the turn controller appends while a request is running; messages
/// are never edited or removed once pushed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously persisted history.
    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn push_user(&mut self, content: &str) {
        self.push(Role::User, content);
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.push(Role::Assistant, content);
    }

    pub fn push_system(&mut self, content: &str) {
        self.push(Role::System, content);
    }

    pub fn push_tool_outcome(&mut self, outcome: &ToolOutcome) {
        self.push(Role::ToolResult, &outcome.to_history_text());
    }

    fn push(&mut self, role: Role, content: &str) {
        self.messages.push(ConversationMessage::new(role, content));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Tool-result messages in the order they were appended.
    pub fn tool_results(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter().filter(|m| m.role == Role::ToolResult)
    }

    pub fn into_messages(self) -> Vec<ConversationMessage> {
        self.messages
    }
}
