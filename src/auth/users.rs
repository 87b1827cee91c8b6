//! User persistence for the auth backend

use crate::error::UserStoreError;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

/// A stored user; `password_hash` is a bcrypt hash, never the password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Storage for registered users
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Looks up a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    /// Inserts a user; fails if the username or email is taken
    async fn insert(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError>;
}

/// SQLite-backed user repository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Connects and creates the `users` table if needed
    pub async fn connect(database_url: &str) -> Result<Self, UserStoreError> {
        // every connection to :memory: opens its own database, so keep one
        // connection alive for the lifetime of the pool
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::info!(database_url, "User store ready");
        Ok(Self { pool })
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
    })
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query("SELECT id, username, email, password FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn insert(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserStoreError> {
        let result = sqlx::query("INSERT INTO users (username, email, password) VALUES (?, ?, ?)")
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        assert!(repo.find_by_email("a@example.com").await.unwrap().is_none());

        let user = repo.insert("alice", "a@example.com", "hash").await.unwrap();
        let found = repo.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let repo = SqliteUserRepository::connect("sqlite::memory:").await.unwrap();
        repo.insert("alice", "a@example.com", "hash").await.unwrap();

        assert!(repo.insert("alice", "other@example.com", "hash").await.is_err());
        assert!(repo.insert("bob", "a@example.com", "hash").await.is_err());
    }
}
