//! Study group repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::user::parse_datetime;
use super::DbPool;
use crate::{Error, Result};

/// A study group
#[derive(Debug, Clone, serde::Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Group repository
#[derive(Clone)]
pub struct GroupRepo {
    pool: DbPool,
}

impl GroupRepo {
    /// Create a new group repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a group; the creator joins automatically
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the group name is taken
    pub fn create(&self, name: &str, description: Option<&str>, created_by: &str) -> Result<Group> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO groups (id, name, description, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![&id, name, description, created_by, &now.to_rfc3339()],
        )
        .map_err(|e| super::map_insert_err(e, "a group with this name already exists"))?;

        conn.execute(
            "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2)",
            [&id, created_by],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(name, "group created");

        Ok(Group {
            id,
            name: name.to_string(),
            description: description.map(String::from),
            created_by: created_by.to_string(),
            member_count: 1,
            created_at: now,
        })
    }

    /// Join a group; joining twice is a no-op
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the group does not exist
    pub fn join(&self, group_id: &str, user_id: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM groups WHERE id = ?1",
                [group_id],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?
            > 0;

        if !exists {
            return Err(Error::NotFound(format!("group {group_id}")));
        }

        conn.execute(
            "INSERT INTO group_members (group_id, user_id) VALUES (?1, ?2)
             ON CONFLICT(group_id, user_id) DO NOTHING",
            [group_id, user_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// List all groups with member counts
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<Group>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT g.id, g.name, g.description, g.created_by, COUNT(m.user_id), g.created_at
                 FROM groups g
                 LEFT JOIN group_members m ON m.group_id = g.id
                 GROUP BY g.id
                 ORDER BY g.name ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let groups = stmt
            .query_map([], |row| {
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_by: row.get(3)?,
                    member_count: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory, UserRepo};

    fn setup() -> (GroupRepo, UserRepo, String) {
        let pool = init_memory().unwrap();
        let users = UserRepo::new(pool.clone());
        let user = users.create("test-user").unwrap();
        (GroupRepo::new(pool), users, user.id)
    }

    #[test]
    fn test_creator_joins_automatically() {
        let (repo, _, user) = setup();

        let group = repo.create("sem-5", Some("fifth semester"), &user).unwrap();
        assert_eq!(group.member_count, 1);

        let listed = repo.list_all().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].member_count, 1);
    }

    #[test]
    fn test_join_is_idempotent() {
        let (repo, users, user) = setup();
        let other = users.create("other").unwrap();

        let group = repo.create("sem-5", None, &user).unwrap();
        repo.join(&group.id, &other.id).unwrap();
        repo.join(&group.id, &other.id).unwrap();

        assert_eq!(repo.list_all().unwrap()[0].member_count, 2);
    }

    #[test]
    fn test_join_missing_group() {
        let (repo, _, user) = setup();
        assert!(repo.join("no-such-group", &user).is_err());
    }
}
