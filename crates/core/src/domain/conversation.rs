use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::OrderRecord;

/// Three user/assistant exchanges.
pub const DEFAULT_HISTORY_LIMIT: usize = 6;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Language a reply should be written in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// English.
    #[default]
    Primary,
    /// Hindi or Hinglish.
    Secondary,
}

impl Language {
    pub fn from_secondary_flag(is_secondary: bool) -> Self {
        if is_secondary {
            Self::Secondary
        } else {
            Self::Primary
        }
    }

    pub fn is_secondary(self) -> bool {
        matches!(self, Self::Secondary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "english",
            Self::Secondary => "hindi",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    history: VecDeque<ChatMessage>,
    history_limit: usize,
    pub active_order: Option<OrderRecord>,
    pub language: Language,
}

impl Session {
    pub fn new(id: SessionId, history_limit: usize) -> Self {
        Self {
            id,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
            active_order: None,
            language: Language::default(),
        }
    }

    /// Appends a message, evicting the oldest entries once the limit is reached.
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.push(ChatMessage::user(user));
        self.push(ChatMessage::assistant(assistant));
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &ChatMessage> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReply {
    pub response: String,
    pub end_chat: bool,
    pub follow_up: Option<String>,
}

impl TurnReply {
    pub fn message(response: impl Into<String>) -> Self {
        Self { response: response.into(), end_chat: false, follow_up: None }
    }

    pub fn with_follow_up(mut self, follow_up: impl Into<String>) -> Self {
        self.follow_up = Some(follow_up.into());
        self
    }

    pub fn ending(response: impl Into<String>) -> Self {
        Self { response: response.into(), end_chat: true, follow_up: None }
    }
}
