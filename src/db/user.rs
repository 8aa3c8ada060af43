//! User repository and bearer-token identity

use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Points awarded for completing a reminder
pub const COMPLETION_POINTS: i64 = 10;

/// A registered user
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub api_token: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// One row of the leaderboard
#[derive(Debug, Clone, serde::Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub points: i64,
    pub completions: i64,
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a user with a freshly generated API token
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the username is taken
    pub fn create(&self, username: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let token = generate_token();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, username, api_token, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            [&id, username, &token, &now.to_rfc3339()],
        )
        .map_err(|e| super::map_insert_err(e, "username already taken"))?;

        tracing::info!(username, "user created");

        Ok(User {
            id,
            username: username.to_string(),
            api_token: token,
            points: 0,
            created_at: now,
        })
    }

    /// Resolve a bearer token to a user
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token is unknown
    pub fn find_by_token(&self, token: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, username, api_token, points, created_at
             FROM users WHERE api_token = ?1",
            [token],
            row_to_user,
        )
        .map_err(|_| Error::Unauthorized)
    }

    /// Look up a user by username
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such user exists
    pub fn find_by_username(&self, username: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, username, api_token, points, created_at
             FROM users WHERE username = ?1",
            [username],
            row_to_user,
        )
        .map_err(|_| Error::NotFound(format!("user {username}")))
    }

    /// Look up a user by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such user exists
    pub fn get(&self, id: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, username, api_token, points, created_at
             FROM users WHERE id = ?1",
            [id],
            row_to_user,
        )
        .map_err(|_| Error::NotFound(format!("user {id}")))
    }

    /// Add points to a user's total
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add_points(&self, user_id: &str, points: i64) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "UPDATE users SET points = points + ?1 WHERE id = ?2",
            rusqlite::params![points, user_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Leaderboard: users ordered by points, ties broken by completion count
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT u.username, u.points, COUNT(c.id) AS completions
                 FROM users u
                 LEFT JOIN reminder_completions c ON c.user_id = u.id
                 GROUP BY u.id
                 ORDER BY u.points DESC, completions DESC, u.username ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let entries = stmt
            .query_map([], |row| {
                Ok(LeaderboardEntry {
                    username: row.get(0)?,
                    points: row.get(1)?,
                    completions: row.get(2)?,
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(entries)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        api_token: row.get(2)?,
        points: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

/// Generate a 256-bit hex API token
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> UserRepo {
        UserRepo::new(init_memory().unwrap())
    }

    #[test]
    fn test_create_and_find_by_token() {
        let repo = setup();

        let user = repo.create("rhea").unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.api_token.len(), 64);

        let found = repo.find_by_token(&user.api_token).unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.username, "rhea");
    }

    #[test]
    fn test_unknown_token_is_unauthorized() {
        let repo = setup();
        assert!(matches!(
            repo.find_by_token("deadbeef"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let repo = setup();
        repo.create("rhea").unwrap();
        assert!(repo.create("rhea").unwrap_err().is_conflict());
    }

    #[test]
    fn test_points_accumulate() {
        let repo = setup();
        let user = repo.create("dev").unwrap();

        repo.add_points(&user.id, COMPLETION_POINTS).unwrap();
        repo.add_points(&user.id, COMPLETION_POINTS).unwrap();

        assert_eq!(repo.get(&user.id).unwrap().points, 20);
    }
}
