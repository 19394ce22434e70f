//! Message envelope exchanged between agents and the per-agent conversation log.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rendered in place of a transcript when nothing has been exchanged yet.
pub const EMPTY_HISTORY: &str = "No previous conversation.";

/// Number of messages included in a context view unless configured otherwise.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Query,
    Response,
    Critique,
    ContextUpdate,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Query => "query",
            MessageType::Response => "response",
            MessageType::Critique => "critique",
            MessageType::ContextUpdate => "context_update",
            MessageType::Error => "error",
        }
    }
}

/// A message between agents.
///
/// Fields are only reachable through accessors; the builder methods consume
/// the value, so a message cannot change once it has been handed to a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    sender: String,
    recipient: String,
    kind: MessageType,
    content: String,
    context: HashMap<String, Value>,
    metadata: HashMap<String, Value>,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        kind: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            kind,
            content: content.into(),
            context: HashMap::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Single transcript line: `[sender -> recipient]: content`.
    pub fn to_prompt_context(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} -> {}]: {}", self.sender, self.recipient, self.content)
    }
}

/// Append-only, arrival-ordered log of the messages one agent has seen.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: VecDeque<Message>,
    max_retained: Option<usize>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that evicts its oldest entries once `max_retained` is exceeded.
    pub fn with_retention(max_retained: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_retained: Some(max_retained.max(1)),
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push_back(message);
        if let Some(limit) = self.max_retained {
            while self.messages.len() > limit {
                self.messages.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The `n` most recent messages in arrival order.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Message> {
        self.messages.iter().skip(self.messages.len().saturating_sub(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Flat transcript of the last `window` messages, or [`EMPTY_HISTORY`].
    pub fn context_view(&self, window: usize) -> String {
        if self.messages.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        self.recent(window)
            .map(Message::to_prompt_context)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
