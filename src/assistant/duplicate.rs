//! Semantic duplicate screening for create commands
//!
//! Before a candidate is persisted it is compared against the open
//! records of the same kind. With nothing open the guard answers
//! immediately; otherwise the chat model judges similarity and replies
//! `DUPLICATE|<reason>` or `UNIQUE`.

use crate::db::{Exam, NewExam, NewReminder, Reminder};
use crate::llm::{ChatMessage, SharedChatBackend};
use crate::Result;

/// Outcome of a duplicate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub reason: Option<String>,
}

impl DuplicateVerdict {
    const fn unique() -> Self {
        Self {
            is_duplicate: false,
            reason: None,
        }
    }
}

/// Screens creation candidates against open records
pub struct DuplicateGuard {
    backend: SharedChatBackend,
}

impl DuplicateGuard {
    /// Create a new duplicate guard
    #[must_use]
    pub fn new(backend: SharedChatBackend) -> Self {
        Self { backend }
    }

    /// Check a reminder candidate against open reminders
    ///
    /// # Errors
    ///
    /// Never fails on upstream trouble: the guard fails open (treats the
    /// candidate as unique) so an auxiliary outage cannot block input
    pub async fn check_reminder(
        &self,
        candidate: &NewReminder,
        existing: &[Reminder],
    ) -> Result<DuplicateVerdict> {
        if existing.is_empty() {
            return Ok(DuplicateVerdict::unique());
        }

        let mut listing = String::new();
        for (i, r) in existing.iter().enumerate() {
            listing.push_str(&format!(
                "{}. Title: {}, Subject: {}, Deadline: {}, Description: {}\n",
                i + 1,
                r.title,
                r.subject,
                r.deadline.date_naive(),
                r.description.as_deref().unwrap_or("None"),
            ));
        }

        let prompt = format!(
            r"You are a duplicate detection system for assignment reminders.

New reminder to check:
Title: {}
Subject: {}
Deadline: {}
Description: {}

Existing reminders:
{listing}
Analyze if the new reminder is a duplicate or very similar to any existing reminder. Consider:
- Same or very similar title
- Same subject
- Similar deadlines (within 1-2 days)
- Similar descriptions

Respond with ONLY one line: DUPLICATE|<brief reason> if it's clearly a duplicate, or UNIQUE if it's different.",
            candidate.title,
            candidate.subject,
            candidate.deadline.date_naive(),
            candidate.description.as_deref().unwrap_or("None"),
        );

        Ok(self.judge(&prompt).await)
    }

    /// Check an exam candidate against open exams
    ///
    /// # Errors
    ///
    /// Never fails on upstream trouble (fails open, see `check_reminder`)
    pub async fn check_exam(
        &self,
        candidate: &NewExam,
        existing: &[Exam],
    ) -> Result<DuplicateVerdict> {
        if existing.is_empty() {
            return Ok(DuplicateVerdict::unique());
        }

        let mut listing = String::new();
        for (i, e) in existing.iter().enumerate() {
            listing.push_str(&format!(
                "{}. Subject: {}, Date: {}, Type: {}, Description: {}\n",
                i + 1,
                e.subject,
                e.exam_date.date_naive(),
                e.exam_type,
                e.description.as_deref().unwrap_or("None"),
            ));
        }

        let prompt = format!(
            r"You are a duplicate detection system for exam schedules.

New exam to check:
Subject: {}
Date: {}
Type: {}
Description: {}

Existing exams:
{listing}
Analyze if the new exam is a duplicate or very similar to any existing exam. Consider:
- Same subject and exam type
- Similar dates (within 1-2 days)
- Similar descriptions

Respond with ONLY one line: DUPLICATE|<brief reason> if it's clearly a duplicate, or UNIQUE if it's different.",
            candidate.subject,
            candidate.exam_date.date_naive(),
            candidate.exam_type,
            candidate.description.as_deref().unwrap_or("None"),
        );

        Ok(self.judge(&prompt).await)
    }

    /// Run the similarity prompt, failing open on any upstream error
    async fn judge(&self, prompt: &str) -> DuplicateVerdict {
        let messages = [
            ChatMessage::system(
                "You are a precise duplicate detection system. Respond concisely.",
            ),
            ChatMessage::user(prompt),
        ];

        match self.backend.complete(&messages).await {
            Ok(reply) => parse_verdict(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "duplicate check failed, allowing creation");
                DuplicateVerdict::unique()
            }
        }
    }
}

/// Parse the fixed `DUPLICATE|<reason>` / `UNIQUE` reply shape
fn parse_verdict(reply: &str) -> DuplicateVerdict {
    let reply = reply.trim();
    let (status, reason) = reply
        .split_once('|')
        .map_or((reply, None), |(s, r)| (s, Some(r.trim())));

    let is_duplicate = status.trim().to_uppercase().contains("DUPLICATE");

    DuplicateVerdict {
        is_duplicate,
        reason: if is_duplicate {
            reason.filter(|r| !r.is_empty()).map(String::from)
        } else {
            None
        },
    }
}
