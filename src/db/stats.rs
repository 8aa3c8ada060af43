//! Per-user dashboard statistics

use chrono::{DateTime, Utc};

use super::DbPool;
use crate::{Error, Result};

/// Assignment and exam counts for one user's dashboard
#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub total_reminders: i64,
    pub completed_reminders: i64,
    pub pending_reminders: i64,
    pub overdue_reminders: i64,
    pub upcoming_exams: i64,
}

/// Aggregate-count queries across reminders, completions, and exams
#[derive(Clone)]
pub struct StatsRepo {
    pool: DbPool,
}

impl StatsRepo {
    /// Create a new stats repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Compute dashboard counts for a user as of `now`
    ///
    /// Pending counts reminders the user has not completed; overdue is the
    /// not-completed subset whose deadline has already passed.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn for_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<Stats> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let total_reminders: i64 = conn
            .query_row("SELECT COUNT(*) FROM reminders", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;

        let completed_reminders: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reminder_completions WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let overdue_reminders: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM reminders r
                 WHERE r.deadline < ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM reminder_completions c
                       WHERE c.reminder_id = r.id AND c.user_id = ?2
                   )",
                rusqlite::params![&now.to_rfc3339(), user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let upcoming_exams: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM exams WHERE exam_date >= ?1",
                [&now.to_rfc3339()],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Stats {
            total_reminders,
            completed_reminders,
            pending_reminders: total_reminders - completed_reminders,
            overdue_reminders,
            upcoming_exams,
        })
    }
}
