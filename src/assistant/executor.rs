//! Command execution against the store

use super::extractor::{Command, ItemKind};
use super::Outcome;
use crate::db::{DbPool, ExamRepo, NewExam, NewReminder, ReminderRepo, User};
use crate::{Error, Result};

/// Applies resolved commands for a caller
///
/// Ownership is enforced here, not trusted from extraction: delete
/// requests only ever touch rows owned by the caller, and rows that
/// aren't are dropped from the count rather than reported.
#[derive(Clone)]
pub struct CommandExecutor {
    reminders: ReminderRepo,
    exams: ExamRepo,
}

impl CommandExecutor {
    /// Create a new executor over the given pool
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            reminders: ReminderRepo::new(pool.clone()),
            exams: ExamRepo::new(pool),
        }
    }

    /// Apply a command on behalf of `user`
    ///
    /// # Errors
    ///
    /// Returns error when persistence fails; unique-constraint violations
    /// become an "already exists" outcome instead of an error
    pub fn execute(&self, command: &Command, user: &User) -> Result<Outcome> {
        match command {
            Command::CreateReminder(new) => self.create_reminder(new, user),
            Command::CreateExam(new) => self.create_exam(new, user),
            Command::Delete(target) => {
                let count = match target.kind {
                    ItemKind::Reminder => self.reminders.delete_owned(&target.ids, &user.id)?,
                    ItemKind::Exam => self.exams.delete_owned(&target.ids, &user.id)?,
                };

                let noun = match (target.kind, count) {
                    (ItemKind::Reminder, 1) => "reminder",
                    (ItemKind::Reminder, _) => "reminders",
                    (ItemKind::Exam, 1) => "exam",
                    (ItemKind::Exam, _) => "exams",
                };

                Ok(Outcome::DeleteSuccess {
                    message: format!("Successfully deleted {count} {noun}"),
                    item_type: target.kind.as_str().to_string(),
                    count,
                })
            }
            Command::Clarification(message) => Ok(Outcome::Clarification {
                message: message.clone(),
            }),
        }
    }

    fn create_reminder(&self, new: &NewReminder, user: &User) -> Result<Outcome> {
        match self.reminders.create(new, &user.id) {
            Ok(reminder) => Ok(Outcome::Reminder {
                message: format!(
                    "Reminder created! {} due {}",
                    reminder.subject,
                    reminder.deadline.date_naive()
                ),
                title: reminder.title,
                subject: reminder.subject,
                date: reminder.deadline.date_naive().to_string(),
            }),
            Err(Error::Conflict(msg)) => Ok(Outcome::Response {
                message: format!("Already exists: {msg}"),
            }),
            Err(e) => Err(e),
        }
    }

    fn create_exam(&self, new: &NewExam, user: &User) -> Result<Outcome> {
        match self.exams.create(new, &user.id, &user.username) {
            Ok(exam) => Ok(Outcome::Exam {
                message: format!(
                    "Exam created! {} on {}",
                    exam.subject,
                    exam.exam_date.date_naive()
                ),
                subject: exam.subject,
                date: exam.exam_date.date_naive().to_string(),
                exam_type: exam.exam_type,
            }),
            Err(Error::Conflict(msg)) => Ok(Outcome::Response {
                message: format!("Already exists: {msg}"),
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::super::extractor::DeleteTarget;
    use super::*;
    use crate::db::{init_memory, UserRepo};

    fn setup() -> (CommandExecutor, ReminderRepo, User, User) {
        let pool = init_memory().unwrap();
        let users = UserRepo::new(pool.clone());
        let alice = users.create("alice").unwrap();
        let bob = users.create("bob").unwrap();
        (
            CommandExecutor::new(pool.clone()),
            ReminderRepo::new(pool),
            alice,
            bob,
        )
    }

    fn reminder_command(title: &str) -> Command {
        Command::CreateReminder(NewReminder {
            title: title.to_string(),
            subject: "Maths".to_string(),
            deadline: Utc::now() + Duration::days(3),
            description: None,
        })
    }

    #[test]
    fn test_create_reminder_outcome() {
        let (executor, _, alice, _) = setup();

        let outcome = executor.execute(&reminder_command("Maths HW"), &alice).unwrap();
        let Outcome::Reminder { title, .. } = outcome else {
            panic!("expected reminder outcome");
        };
        assert_eq!(title, "Maths HW");
    }

    #[test]
    fn test_conflict_becomes_already_exists_response() {
        let (executor, _, alice, _) = setup();

        let cmd = reminder_command("Maths HW");
        executor.execute(&cmd, &alice).unwrap();

        let outcome = executor.execute(&cmd, &alice).unwrap();
        let Outcome::Response { message } = outcome else {
            panic!("expected response outcome");
        };
        assert!(message.contains("Already exists"));
    }

    #[test]
    fn test_delete_excludes_foreign_ids_and_counts() {
        let (executor, reminders, alice, bob) = setup();

        let mine = reminders
            .create(
                &NewReminder {
                    title: "Mine".to_string(),
                    subject: "Maths".to_string(),
                    deadline: Utc::now() + Duration::days(1),
                    description: None,
                },
                &alice.id,
            )
            .unwrap();
        let theirs = reminders
            .create(
                &NewReminder {
                    title: "Theirs".to_string(),
                    subject: "Maths".to_string(),
                    deadline: Utc::now() + Duration::days(2),
                    description: None,
                },
                &bob.id,
            )
            .unwrap();

        let cmd = Command::Delete(DeleteTarget {
            kind: ItemKind::Reminder,
            ids: vec![mine.id, theirs.id.clone()],
        });

        let Outcome::DeleteSuccess { message, count, .. } =
            executor.execute(&cmd, &alice).unwrap()
        else {
            panic!("expected delete outcome");
        };
        assert_eq!(count, 1);
        assert_eq!(message, "Successfully deleted 1 reminder");

        // Bob's row survived
        assert!(reminders.get(&theirs.id).is_ok());
    }

    #[test]
    fn test_delete_foreign_only_reports_zero() {
        let (executor, reminders, alice, bob) = setup();

        let theirs = reminders
            .create(
                &NewReminder {
                    title: "Theirs".to_string(),
                    subject: "Maths".to_string(),
                    deadline: Utc::now() + Duration::days(2),
                    description: None,
                },
                &bob.id,
            )
            .unwrap();

        let cmd = Command::Delete(DeleteTarget {
            kind: ItemKind::Reminder,
            ids: vec![theirs.id],
        });

        let Outcome::DeleteSuccess { message, count, .. } =
            executor.execute(&cmd, &alice).unwrap()
        else {
            panic!("expected delete outcome");
        };
        assert_eq!(count, 0);
        assert_eq!(message, "Successfully deleted 0 reminders");
    }
}
