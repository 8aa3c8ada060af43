//! Reminder (assignment) repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::user::{COMPLETION_POINTS, parse_datetime};
use super::DbPool;
use crate::{Error, Result};

/// An assignment reminder with a deadline
#[derive(Debug, Clone, serde::Serialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub deadline: DateTime<Utc>,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a reminder
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub title: String,
    pub subject: String,
    pub deadline: DateTime<Utc>,
    pub description: Option<String>,
}

/// Partial update applied by the owner
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

/// A per-user completion record
#[derive(Debug, Clone, serde::Serialize)]
pub struct Completion {
    pub id: String,
    pub reminder_id: String,
    pub user_id: String,
    pub file_url: Option<String>,
    pub points_awarded: i64,
    pub completed_at: DateTime<Utc>,
}

/// Reminder repository
#[derive(Clone)]
pub struct ReminderRepo {
    pool: DbPool,
}

impl ReminderRepo {
    /// Create a new reminder repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a reminder
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when an equivalent reminder already exists
    pub fn create(&self, new: &NewReminder, created_by: &str) -> Result<Reminder> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO reminders (id, title, subject, deadline, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &id,
                &new.title,
                &new.subject,
                &new.deadline.to_rfc3339(),
                &new.description,
                created_by,
                &now.to_rfc3339(),
            ],
        )
        .map_err(|e| super::map_insert_err(e, "this reminder is already created"))?;

        tracing::info!(title = %new.title, subject = %new.subject, "reminder created");

        Ok(Reminder {
            id,
            title: new.title.clone(),
            subject: new.subject.clone(),
            deadline: new.deadline,
            description: new.description.clone(),
            created_by: created_by.to_string(),
            created_at: now,
        })
    }

    /// List all reminders ordered by deadline
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<Reminder>> {
        self.query_reminders("SELECT id, title, subject, deadline, description, created_by, created_at
             FROM reminders ORDER BY deadline ASC", &[])
    }

    /// List open reminders (deadline at or after `now`), soonest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.query_reminders(
            "SELECT id, title, subject, deadline, description, created_by, created_at
             FROM reminders WHERE deadline >= ?1 ORDER BY deadline ASC",
            &[&now.to_rfc3339()],
        )
    }

    /// List a user's own open reminders, soonest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_open_owned(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.query_reminders(
            "SELECT id, title, subject, deadline, description, created_by, created_at
             FROM reminders WHERE deadline >= ?1 AND created_by = ?2 ORDER BY deadline ASC",
            &[&now.to_rfc3339(), &owner.to_string()],
        )
    }

    /// Fetch one reminder
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such reminder exists
    pub fn get(&self, id: &str) -> Result<Reminder> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, title, subject, deadline, description, created_by, created_at
             FROM reminders WHERE id = ?1",
            [id],
            row_to_reminder,
        )
        .map_err(|_| Error::NotFound(format!("reminder {id}")))
    }

    /// Apply a partial update, scoped to the owner
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the reminder does not exist or is not owned
    /// by `owner` (ownership failures are indistinguishable by design)
    pub fn update(&self, id: &str, owner: &str, update: &ReminderUpdate) -> Result<Reminder> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let affected = conn
            .execute(
                "UPDATE reminders SET
                    title = COALESCE(?1, title),
                    subject = COALESCE(?2, subject),
                    deadline = COALESCE(?3, deadline),
                    description = COALESCE(?4, description)
                 WHERE id = ?5 AND created_by = ?6",
                rusqlite::params![
                    &update.title,
                    &update.subject,
                    &update.deadline.map(|d| d.to_rfc3339()),
                    &update.description,
                    id,
                    owner,
                ],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        if affected == 0 {
            return Err(Error::NotFound(format!("reminder {id}")));
        }
        drop(conn);

        self.get(id)
    }

    /// Delete the given reminders, keeping only rows owned by `owner`
    ///
    /// Foreign IDs are silently excluded; the returned count reflects rows
    /// actually deleted.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_owned(&self, ids: &[String], owner: &str) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "DELETE FROM reminders WHERE created_by = ? AND id IN ({placeholders})"
        );

        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&owner];
        for id in ids {
            params.push(id);
        }

        let deleted = conn
            .execute(&sql, params.as_slice())
            .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(requested = ids.len(), deleted, "reminders deleted");
        Ok(deleted)
    }

    /// Mark a reminder complete for a user (upsert)
    ///
    /// Points are awarded only when the completion is new; re-completing
    /// updates the file reference without double-counting.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn complete(
        &self,
        reminder_id: &str,
        user_id: &str,
        file_url: Option<&str>,
    ) -> Result<Completion> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let existing: Option<(String, i64, String)> = conn
            .query_row(
                "SELECT id, points_awarded, completed_at FROM reminder_completions
                 WHERE reminder_id = ?1 AND user_id = ?2",
                [reminder_id, user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .ok();

        if let Some((id, points_awarded, completed_at)) = existing {
            conn.execute(
                "UPDATE reminder_completions SET file_url = ?1 WHERE id = ?2",
                rusqlite::params![file_url, &id],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

            return Ok(Completion {
                id,
                reminder_id: reminder_id.to_string(),
                user_id: user_id.to_string(),
                file_url: file_url.map(String::from),
                points_awarded,
                completed_at: parse_datetime(&completed_at),
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO reminder_completions
                (id, reminder_id, user_id, file_url, points_awarded, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                &id,
                reminder_id,
                user_id,
                file_url,
                COMPLETION_POINTS,
                &now.to_rfc3339(),
            ],
        )
        .map_err(|e| super::map_insert_err(e, "already completed"))?;

        conn.execute(
            "UPDATE users SET points = points + ?1 WHERE id = ?2",
            rusqlite::params![COMPLETION_POINTS, user_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(reminder_id, user_id, "reminder completed");

        Ok(Completion {
            id,
            reminder_id: reminder_id.to_string(),
            user_id: user_id.to_string(),
            file_url: file_url.map(String::from),
            points_awarded: COMPLETION_POINTS,
            completed_at: now,
        })
    }

    /// List completions for a reminder
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn completions(&self, reminder_id: &str) -> Result<Vec<Completion>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, reminder_id, user_id, file_url, points_awarded, completed_at
                 FROM reminder_completions WHERE reminder_id = ?1
                 ORDER BY completed_at ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let completions = stmt
            .query_map([reminder_id], |row| {
                Ok(Completion {
                    id: row.get(0)?,
                    reminder_id: row.get(1)?,
                    user_id: row.get(2)?,
                    file_url: row.get(3)?,
                    points_awarded: row.get(4)?,
                    completed_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(completions)
    }

    fn query_reminders(&self, sql: &str, params: &[&String]) -> Result<Vec<Reminder>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let reminders = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_reminder)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(reminders)
    }
}

fn row_to_reminder(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        title: row.get(1)?,
        subject: row.get(2)?,
        deadline: parse_datetime(&row.get::<_, String>(3)?),
        description: row.get(4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}
