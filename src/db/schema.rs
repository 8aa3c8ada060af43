//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Users table
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            api_token TEXT NOT NULL UNIQUE,
            points INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Reminders (assignments) table
        CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            subject TEXT NOT NULL,
            deadline TEXT NOT NULL,
            description TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_reminders_deadline ON reminders(deadline);
        CREATE INDEX IF NOT EXISTS idx_reminders_owner ON reminders(created_by);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_reminders_unique
            ON reminders(title, subject, date(deadline));

        -- Per-user completion records, one per (reminder, user)
        CREATE TABLE IF NOT EXISTS reminder_completions (
            id TEXT PRIMARY KEY,
            reminder_id TEXT NOT NULL REFERENCES reminders(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            file_url TEXT,
            points_awarded INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(reminder_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_completions_user ON reminder_completions(user_id);

        -- Exams table
        CREATE TABLE IF NOT EXISTS exams (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            exam_date TEXT NOT NULL,
            exam_type TEXT NOT NULL
                CHECK(exam_type IN ('Internal Test', 'Viva', 'Mid-Sem', 'Final')),
            description TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            uploader_name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_exams_date ON exams(exam_date);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_exams_unique
            ON exams(subject, exam_date, exam_type);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::debug!("migrated database to v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Study groups
        CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id),
            joined_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (group_id, user_id)
        );

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::debug!("migrated database to v2");
    Ok(())
}
