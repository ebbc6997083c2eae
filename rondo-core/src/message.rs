//! Conversation messages and the shared, append-only history.

use crate::identity::{SequenceNumber, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Source name used for the task that seeds a run.
pub const USER_SOURCE: &str = "user";

/// How a message entered the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Seeded before the first turn (the run's task)
    Task,
    /// Produced by a participant's turn
    Turn,
}

/// An immutable conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic position in the history, assigned at append time
    pub sequence_number: SequenceNumber,
    /// Agent name, or "user" for the seeded task
    pub source: String,
    /// Message text
    pub content: String,
    /// Whether this message is the task or a turn
    pub kind: MessageKind,
    /// When the message was appended
    pub created_at: Timestamp,
}

impl Message {
    /// Check whether the content contains `marker` (case-sensitive).
    pub fn mentions(&self, marker: &str) -> bool {
        self.content.contains(marker)
    }
}

/// The ordered message sequence shared by every participant in a run.
///
/// Messages can only be appended. Nothing hands out mutable access to a stored
/// message, so an earlier observation is always a prefix of a later one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the run's task. Only valid before any turn has been appended.
    pub fn seed_task(&mut self, content: impl Into<String>) -> &Message {
        debug_assert!(self.turn_count() == 0, "task seeded after a turn");
        self.push(USER_SOURCE.to_string(), content.into(), MessageKind::Task)
    }

    /// Append the message produced by a turn.
    pub fn append_turn(&mut self, source: impl Into<String>, content: impl Into<String>) -> &Message {
        self.push(source.into(), content.into(), MessageKind::Turn)
    }

    fn push(&mut self, source: String, content: String, kind: MessageKind) -> &Message {
        let message = Message {
            sequence_number: self.messages.len() as SequenceNumber,
            source,
            content,
            kind,
            created_at: Utc::now(),
        };
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recently appended message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages appended by turns (the seeded task excluded).
    pub fn turn_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::Turn)
            .count()
    }

    /// Messages appended by a given source.
    pub fn from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.source == source)
    }

    /// Check whether this history is a prefix of `other`.
    pub fn is_prefix_of(&self, other: &History) -> bool {
        self.messages.len() <= other.messages.len()
            && self
                .messages
                .iter()
                .zip(other.messages.iter())
                .all(|(a, b)| a == b)
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
