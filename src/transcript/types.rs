//! Types for chat turns and the session transcript.

use serde::{Deserialize, Serialize};

use super::clock::Clock;

/// Fixed timestamp layout used for every turn: `YYYY-MM-DD HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("turn {index} has no timestamp")]
    MissingTimestamp { index: usize },
    #[error("invalid timestamp {value:?}: expected YYYY-MM-DD HH:MM:SS")]
    BadTimestamp { value: String },
    #[error("failed to format timestamp: {0}")]
    Format(String),
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Result<Self, TranscriptError> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(TranscriptError::UnknownRole(other.to_string())),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "You",
            Role::Assistant => "Tutor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the transcript.
///
/// `timestamp` stays `None` until the turn is annotated; `response_time` is
/// only ever set by [`recompute_response_times`](super::recompute_response_times).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: Option<String>,
    pub length: usize,
    pub response_time: Option<u64>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        let length = super::word_count(&content);
        Self {
            role,
            content,
            timestamp: None,
            length,
            response_time: None,
        }
    }

    /// Build a raw turn from an untyped role string
    pub fn from_parts(role: &str, content: impl Into<String>) -> Result<Self, TranscriptError> {
        Ok(Self::new(Role::parse(role)?, content))
    }

    pub fn is_annotated(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// Role/content pair sent to the completion service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Ordered turns for one session. Insertion order is chronological order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Stamp every turn that has no timestamp yet. Stamped turns keep theirs.
    pub fn annotate_pending(&mut self, clock: &dyn Clock) -> Result<(), TranscriptError> {
        for turn in self.turns.iter_mut().filter(|t| !t.is_annotated()) {
            *turn = super::annotate(turn.clone(), clock)?;
        }
        Ok(())
    }

    /// Turns a user should see (everything except system turns)
    pub fn visible(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role != Role::System)
    }

    /// Full history as role/content pairs, system turns included
    pub fn completion_messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().map(ChatMessage::from).collect()
    }
}
