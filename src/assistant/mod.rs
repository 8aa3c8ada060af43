//! Natural-language command pipeline
//!
//! One cycle per utterance: the transcript is routed by a keyword
//! fast-path ([`intent`]), turned into a structured command by the chat
//! model ([`extractor`]), screened for semantic duplicates on creation
//! ([`duplicate`]), and applied against the store ([`executor`]).
//! [`pipeline`] ties the stages together and owns the turn sequencing.

pub mod duplicate;
pub mod executor;
pub mod extractor;
pub mod intent;
pub mod pipeline;

use crate::llm::ChatMessage;

pub use duplicate::DuplicateGuard;
pub use executor::CommandExecutor;
pub use extractor::{Command, DeleteTarget, Extractor, ItemKind};
pub use intent::Intent;
pub use pipeline::Assistant;

/// Most recent turns kept when assembling model prompts
pub const MAX_HISTORY_TURNS: usize = 20;

/// Conversation state carried across command cycles
///
/// History is accumulated by the caller (client-side for HTTP, in-process
/// for the CLI) and passed into every cycle; nothing here persists.
#[derive(Debug, Clone, Default)]
pub struct Session {
    history: Vec<ChatMessage>,
}

impl Session {
    /// Create an empty session
    #[must_use]
    pub const fn new() -> Self {
        Self {
            history: Vec::new(),
        }
    }

    /// Rebuild a session from turns supplied by the caller
    #[must_use]
    pub fn from_history(history: Vec<ChatMessage>) -> Self {
        Self { history }
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::user(content));
    }

    /// Append an assistant turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::assistant(content));
    }

    /// The newest [`MAX_HISTORY_TURNS`] turns, oldest first
    #[must_use]
    pub fn recent(&self) -> &[ChatMessage] {
        let skip = self.history.len().saturating_sub(MAX_HISTORY_TURNS);
        &self.history[skip..]
    }

    /// Full accumulated history
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

/// Terminal result of one command cycle
///
/// Serialized form carries a `type` tag matching what voice clients
/// dispatch on: `response`, `clarification`, `reminder`, `exam`,
/// `delete_success`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Read-only answer to a query
    Response { message: String },
    /// More information needed; nothing was mutated
    Clarification { message: String },
    /// A reminder was created
    Reminder {
        message: String,
        title: String,
        subject: String,
        date: String,
    },
    /// An exam was created
    Exam {
        message: String,
        subject: String,
        date: String,
        exam_type: String,
    },
    /// Records were deleted
    DeleteSuccess {
        message: String,
        item_type: String,
        count: usize,
    },
}

impl Outcome {
    /// The user-facing message for this turn
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Response { message }
            | Self::Clarification { message }
            | Self::Reminder { message, .. }
            | Self::Exam { message, .. }
            | Self::DeleteSuccess { message, .. } => message,
        }
    }
}

/// Steps of one command-processing cycle, in order
///
/// Used for tracing; a cycle may exit back to `Idle` from any step on
/// clarification or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Listening,
    Transcribing,
    Classifying,
    Extracting,
    CheckingDuplicate,
    Executing,
}

impl CycleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::CheckingDuplicate => "checking_duplicate",
            Self::Executing => "executing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_recent_is_bounded() {
        let mut session = Session::new();
        for i in 0..30 {
            session.push_user(format!("turn {i}"));
        }

        assert_eq!(session.history().len(), 30);
        let recent = session.recent();
        assert_eq!(recent.len(), MAX_HISTORY_TURNS);
        assert_eq!(recent[0].content, "turn 10");
        assert_eq!(recent[MAX_HISTORY_TURNS - 1].content, "turn 29");
    }

    #[test]
    fn test_outcome_type_tags() {
        let outcome = Outcome::DeleteSuccess {
            message: "Successfully deleted 2 reminders".to_string(),
            item_type: "reminder".to_string(),
            count: 2,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "delete_success");
        assert_eq!(json["count"], 2);

        let outcome = Outcome::Response {
            message: "You have 1 pending assignment".to_string(),
        };
        assert_eq!(serde_json::to_value(&outcome).unwrap()["type"], "response");
    }
}
