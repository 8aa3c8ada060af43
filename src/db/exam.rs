//! Exam repository and the closed exam-type vocabulary

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::user::parse_datetime;
use super::DbPool;
use crate::{Error, Result};

/// The four canonical exam types
///
/// Everything the extractor or API produces is normalized into this set
/// before it reaches storage; the schema rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamType {
    InternalTest,
    Viva,
    MidSem,
    Final,
}

impl ExamType {
    pub const ALL: [Self; 4] = [Self::InternalTest, Self::Viva, Self::MidSem, Self::Final];

    /// Canonical string stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InternalTest => "Internal Test",
            Self::Viva => "Viva",
            Self::MidSem => "Mid-Sem",
            Self::Final => "Final",
        }
    }

    /// Parse a canonical string, case-insensitively
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Coerce arbitrary extractor output into the closed vocabulary
    ///
    /// Recognizes loose spellings ("midsem", "mid semester", "viva voce");
    /// anything unrecognized becomes `InternalTest`.
    #[must_use]
    pub fn coerce(s: &str) -> Self {
        if let Some(t) = Self::parse(s) {
            return t;
        }

        let squashed: String = s
            .to_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        if squashed.contains("viva") {
            Self::Viva
        } else if squashed.contains("mid") {
            Self::MidSem
        } else if squashed.contains("final") {
            Self::Final
        } else {
            Self::InternalTest
        }
    }
}

impl std::fmt::Display for ExamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled exam
#[derive(Debug, Clone, serde::Serialize)]
pub struct Exam {
    pub id: String,
    pub subject: String,
    pub exam_date: DateTime<Utc>,
    pub exam_type: String,
    pub description: Option<String>,
    pub created_by: String,
    pub uploader_name: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating an exam
#[derive(Debug, Clone)]
pub struct NewExam {
    pub subject: String,
    pub exam_date: DateTime<Utc>,
    pub exam_type: ExamType,
    pub description: Option<String>,
}

/// Exam repository
#[derive(Clone)]
pub struct ExamRepo {
    pool: DbPool,
}

impl ExamRepo {
    /// Create a new exam repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert an exam
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when an equivalent exam is already scheduled
    pub fn create(&self, new: &NewExam, created_by: &str, uploader_name: &str) -> Result<Exam> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO exams
                (id, subject, exam_date, exam_type, description, created_by, uploader_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                &id,
                &new.subject,
                &new.exam_date.to_rfc3339(),
                new.exam_type.as_str(),
                &new.description,
                created_by,
                uploader_name,
                &now.to_rfc3339(),
            ],
        )
        .map_err(|e| super::map_insert_err(e, "this exam is already scheduled"))?;

        tracing::info!(subject = %new.subject, exam_type = %new.exam_type, "exam created");

        Ok(Exam {
            id,
            subject: new.subject.clone(),
            exam_date: new.exam_date,
            exam_type: new.exam_type.as_str().to_string(),
            description: new.description.clone(),
            created_by: created_by.to_string(),
            uploader_name: uploader_name.to_string(),
            created_at: now,
        })
    }

    /// List all exams ordered by date
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<Exam>> {
        self.query_exams(
            "SELECT id, subject, exam_date, exam_type, description, created_by, uploader_name, created_at
             FROM exams ORDER BY exam_date ASC",
            &[],
        )
    }

    /// List open exams (at or after `now`), soonest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_open(&self, now: DateTime<Utc>) -> Result<Vec<Exam>> {
        self.query_exams(
            "SELECT id, subject, exam_date, exam_type, description, created_by, uploader_name, created_at
             FROM exams WHERE exam_date >= ?1 ORDER BY exam_date ASC",
            &[&now.to_rfc3339()],
        )
    }

    /// List a user's own open exams, soonest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_open_owned(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<Exam>> {
        self.query_exams(
            "SELECT id, subject, exam_date, exam_type, description, created_by, uploader_name, created_at
             FROM exams WHERE exam_date >= ?1 AND created_by = ?2 ORDER BY exam_date ASC",
            &[&now.to_rfc3339(), &owner.to_string()],
        )
    }

    /// Delete the given exams, keeping only rows owned by `owner`
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
        let sql = format!("DELETE FROM exams WHERE created_by = ? AND id IN ({placeholders})");

        let mut params: Vec<&dyn rusqlite::ToSql> = vec![&owner];
        for id in ids {
            params.push(id);
        }

        let deleted = conn
            .execute(&sql, params.as_slice())
            .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(requested = ids.len(), deleted, "exams deleted");
        Ok(deleted)
    }

    fn query_exams(&self, sql: &str, params: &[&String]) -> Result<Vec<Exam>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let exams = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_exam)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(exams)
    }
}

fn row_to_exam(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: row.get(0)?,
        subject: row.get(1)?,
        exam_date: parse_datetime(&row.get::<_, String>(2)?),
        exam_type: row.get(3)?,
        description: row.get(4)?,
        created_by: row.get(5)?,
        uploader_name: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::{init_memory, UserRepo};

    fn setup() -> (ExamRepo, String) {
        let pool = init_memory().unwrap();
        let user = UserRepo::new(pool.clone()).create("test-user").unwrap();
        (ExamRepo::new(pool), user.id)
    }

    fn future_exam(subject: &str, days: i64, exam_type: ExamType) -> NewExam {
        NewExam {
            subject: subject.to_string(),
            exam_date: Utc::now() + Duration::days(days),
            exam_type,
            description: None,
        }
    }

    #[test]
    fn test_exam_type_coercion() {
        assert_eq!(ExamType::coerce("Viva"), ExamType::Viva);
        assert_eq!(ExamType::coerce("viva voce"), ExamType::Viva);
        assert_eq!(ExamType::coerce("mid-sem"), ExamType::MidSem);
        assert_eq!(ExamType::coerce("midsem"), ExamType::MidSem);
        assert_eq!(ExamType::coerce("Mid Semester"), ExamType::MidSem);
        assert_eq!(ExamType::coerce("FINAL"), ExamType::Final);
        assert_eq!(ExamType::coerce("internal test"), ExamType::InternalTest);

        // Out-of-enum values fall back to the default
        assert_eq!(ExamType::coerce("surprise quiz"), ExamType::InternalTest);
        assert_eq!(ExamType::coerce(""), ExamType::InternalTest);
    }

    #[test]
    fn test_exam_type_parse_is_strict() {
        assert_eq!(ExamType::parse("viva"), Some(ExamType::Viva));
        assert_eq!(ExamType::parse("mid-sem"), Some(ExamType::MidSem));
        assert_eq!(ExamType::parse("midsem"), None);
        assert_eq!(ExamType::parse("quiz"), None);
    }

    #[test]
    fn test_create_and_list_open() {
        let (repo, user) = setup();

        repo.create(&future_exam("Maths", 5, ExamType::MidSem), &user, "dev")
            .unwrap();
        repo.create(&future_exam("History", -5, ExamType::Final), &user, "dev")
            .unwrap();

        let open = repo.list_open(Utc::now()).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].subject, "Maths");
        assert_eq!(open[0].exam_type, "Mid-Sem");
    }

    #[test]
    fn test_duplicate_exam_conflicts() {
        let (repo, user) = setup();

        let new = future_exam("Maths", 5, ExamType::Final);
        repo.create(&new, &user, "dev").unwrap();
        assert!(repo.create(&new, &user, "dev").unwrap_err().is_conflict());
    }

    #[test]
    fn test_delete_owned_scoped() {
        let (repo, user) = setup();

        let exam = repo
            .create(&future_exam("Maths", 5, ExamType::Viva), &user, "dev")
            .unwrap();

        // Wrong owner deletes nothing
        assert_eq!(repo.delete_owned(&[exam.id.clone()], "nobody").unwrap(), 0);
        assert_eq!(repo.delete_owned(&[exam.id], &user).unwrap(), 1);
    }
}
