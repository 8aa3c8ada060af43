//! Command-cycle orchestration
//!
//! Sequences one utterance through classify → extract → (guard) →
//! execute. The cycle is strictly sequential; history is appended only
//! after the cycle completes, so a failed cycle leaves the session
//! untouched.

use chrono::Utc;

use super::duplicate::DuplicateGuard;
use super::executor::CommandExecutor;
use super::extractor::{Command, Extractor};
use super::intent::{self, Intent};
use super::{CycleState, Outcome, Session};
use crate::db::{DbPool, ExamRepo, ReminderRepo, User};
use crate::llm::{ChatMessage, SharedChatBackend};
use crate::Result;

/// The voice/text command pipeline
pub struct Assistant {
    reminders: ReminderRepo,
    exams: ExamRepo,
    extractor: Extractor,
    guard: DuplicateGuard,
    executor: CommandExecutor,
    backend: SharedChatBackend,
}

impl Assistant {
    /// Create an assistant over the given store and chat backend
    #[must_use]
    pub fn new(pool: DbPool, backend: SharedChatBackend) -> Self {
        Self {
            reminders: ReminderRepo::new(pool.clone()),
            exams: ExamRepo::new(pool.clone()),
            extractor: Extractor::new(backend.clone()),
            guard: DuplicateGuard::new(backend.clone()),
            executor: CommandExecutor::new(pool),
            backend,
        }
    }

    /// Run one command cycle for `user`
    ///
    /// On success the user and assistant turns are appended to the
    /// session; on error the session is left unchanged and the caller
    /// surfaces the failure.
    ///
    /// # Errors
    ///
    /// Returns upstream chat errors, `MalformedModelOutput`, or
    /// persistence failures; clarifications and duplicate rejections are
    /// outcomes, not errors
    pub async fn classify_and_execute(
        &self,
        transcript: &str,
        session: &mut Session,
        user: &User,
    ) -> Result<Outcome> {
        trace_state(CycleState::Classifying);
        let route = intent::classify(transcript);
        tracing::debug!(?route, transcript, user = %user.username, "fast-path route");

        let outcome = match route {
            Intent::Query => self.answer_query(transcript, session).await?,
            Intent::Delete => self.run_delete(transcript, session, user).await?,
            Intent::Create => self.run_create(transcript, session, user).await?,
        };

        session.push_user(transcript);
        session.push_assistant(outcome.message());
        trace_state(CycleState::Idle);

        Ok(outcome)
    }

    /// Query branch: read open records and let the model answer
    async fn answer_query(&self, transcript: &str, session: &Session) -> Result<Outcome> {
        trace_state(CycleState::Executing);
        let now = Utc::now();

        let reminders = self.reminders.list_open(now)?;
        let exams = self.exams.list_open(now)?;

        let prompt = format!(
            r#"Based on this user query: "{transcript}"

Here are the upcoming reminders: {}
Here are the upcoming exams: {}

Provide a natural, conversational response about their pending assignments and upcoming exams."#,
            serde_json::to_string(&reminders)?,
            serde_json::to_string(&exams)?,
        );

        let mut messages = vec![ChatMessage::system(
            "You are a helpful assistant. Provide brief, natural responses.",
        )];
        messages.extend_from_slice(session.recent());
        messages.push(ChatMessage::user(prompt));

        let message = self.backend.complete(&messages).await?;
        Ok(Outcome::Response { message })
    }

    /// Delete branch: extract matching IDs from the caller's own records
    async fn run_delete(
        &self,
        transcript: &str,
        session: &Session,
        user: &User,
    ) -> Result<Outcome> {
        trace_state(CycleState::Extracting);
        let now = Utc::now();

        let reminders = self.reminders.list_open_owned(&user.id, now)?;
        let exams = self.exams.list_open_owned(&user.id, now)?;

        let command = self
            .extractor
            .extract_delete(
                transcript,
                session.recent(),
                &reminders,
                &exams,
                now.date_naive(),
            )
            .await?;

        trace_state(CycleState::Executing);
        self.executor.execute(&command, user)
    }

    /// Create branch, with duplicate screening before the insert
    async fn run_create(
        &self,
        transcript: &str,
        session: &Session,
        user: &User,
    ) -> Result<Outcome> {
        trace_state(CycleState::Extracting);
        let now = Utc::now();

        let command = self
            .extractor
            .extract_create(transcript, session.recent(), now.date_naive())
            .await?;

        // The fast path is only a hint: when the model comes back with a
        // delete shape, the structured result wins the route
        if matches!(command, Command::Delete(_)) {
            tracing::debug!("extractor overrode create route with delete");
            return self.run_delete(transcript, session, user).await;
        }

        match &command {
            Command::CreateReminder(new) => {
                trace_state(CycleState::CheckingDuplicate);
                let open = self.reminders.list_open(now)?;
                let verdict = self.guard.check_reminder(new, &open).await?;
                if verdict.is_duplicate {
                    return Ok(Outcome::Response {
                        message: verdict
                            .reason
                            .unwrap_or_else(|| "This reminder is already created".to_string()),
                    });
                }
            }
            Command::CreateExam(new) => {
                trace_state(CycleState::CheckingDuplicate);
                let open = self.exams.list_open(now)?;
                let verdict = self.guard.check_exam(new, &open).await?;
                if verdict.is_duplicate {
                    return Ok(Outcome::Response {
                        message: verdict
                            .reason
                            .unwrap_or_else(|| "This exam is already scheduled".to_string()),
                    });
                }
            }
            Command::Delete(_) | Command::Clarification(_) => {}
        }

        trace_state(CycleState::Executing);
        self.executor.execute(&command, user)
    }
}

fn trace_state(state: CycleState) {
    tracing::debug!(state = state.as_str(), "cycle state");
}
