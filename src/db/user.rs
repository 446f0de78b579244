//! User repository

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// A user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    /// Identity provider subject (`sub` claim)
    pub auth_subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields reported by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

const USER_COLUMNS: &str = "id, auth_subject, email, name, picture, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find the user for an identity provider subject, creating it on first sight
    ///
    /// Profile fields present in `profile` overwrite stored ones.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_or_create(&self, profile: &UserProfile) -> Result<User> {
        if profile.subject.trim().is_empty() {
            return Err(Error::Auth("token has no subject".to_string()));
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO users (id, auth_subject, email, name, picture, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(auth_subject) DO UPDATE SET
                email = COALESCE(excluded.email, users.email),
                name = COALESCE(excluded.name, users.name),
                picture = COALESCE(excluded.picture, users.picture),
                updated_at = excluded.updated_at",
            rusqlite::params![
                id,
                profile.subject,
                profile.email,
                profile.name,
                profile.picture,
                now
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE auth_subject = ?1"),
                [&profile.subject],
                row_to_user,
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(user_id = %user.id, subject = %user.auth_subject, "user resolved");
        Ok(user)
    }

    /// Find a user by identity provider subject
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_subject(&self, subject: &str) -> Result<Option<User>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE auth_subject = ?1"),
            [subject],
            row_to_user,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        auth_subject: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        picture: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> UserRepo {
        let pool = init_memory().unwrap();
        UserRepo::new(pool)
    }

    fn profile(subject: &str) -> UserProfile {
        UserProfile {
            subject: subject.to_string(),
            email: Some("sam@example.com".to_string()),
            name: Some("Sam".to_string()),
            picture: None,
        }
    }

    #[test]
    fn test_find_or_create_user() {
        let repo = setup();

        let user = repo.find_or_create(&profile("auth0|123")).unwrap();
        assert_eq!(user.auth_subject, "auth0|123");
        assert_eq!(user.email.as_deref(), Some("sam@example.com"));

        // Should return same user
        let user2 = repo.find_or_create(&profile("auth0|123")).unwrap();
        assert_eq!(user.id, user2.id);
    }

    #[test]
    fn test_profile_updates_keep_known_fields() {
        let repo = setup();
        let user = repo.find_or_create(&profile("auth0|456")).unwrap();

        let updated = repo
            .find_or_create(&UserProfile {
                subject: "auth0|456".to_string(),
                picture: Some("https://example.com/p.png".to_string()),
                ..UserProfile::default()
            })
            .unwrap();

        assert_eq!(updated.id, user.id);
        assert_eq!(updated.name.as_deref(), Some("Sam"));
        assert_eq!(updated.picture.as_deref(), Some("https://example.com/p.png"));
    }

    #[test]
    fn test_find_user() {
        let repo = setup();

        assert!(repo.find_by_subject("auth0|missing").unwrap().is_none());

        let user = repo.find_or_create(&profile("auth0|789")).unwrap();
        assert_eq!(repo.find_by_subject("auth0|789").unwrap(), Some(user));
    }

    #[test]
    fn test_blank_subject_rejected() {
        let repo = setup();
        let err = repo.find_or_create(&profile("  ")).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
