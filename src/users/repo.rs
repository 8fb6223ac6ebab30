use std::{future::Future, time::Duration};

use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error};
use uuid::Uuid;

use super::model::{format_timestamp, User, UserRow};
use crate::auth::password::hash_password_blocking;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,
    #[error("user not found")]
    NotFound,
    #[error("store operation cancelled or timed out")]
    Cancelled,
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error("invalid user record: {0}")]
    InvalidRecord(String),
    #[error("password hashing failed: {0}")]
    Hashing(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict;
            }
        }
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Unavailable(other),
        }
    }
}

/// SQLite-backed user store. Every call is bounded by `timeout`; running
/// past it aborts the query and yields [`StoreError::Cancelled`].
#[derive(Clone)]
pub struct UserRepo {
    db: SqlitePool,
    timeout: Duration,
}

impl UserRepo {
    pub fn new(db: SqlitePool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Cancelled),
        }
    }

    /// Hashes the password, assigns id and creation time and inserts the
    /// user. A taken email is [`StoreError::Conflict`].
    pub async fn create_one(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), StoreError> {
        self.bounded(async {
            let hash = hash_password_blocking(password.to_owned())
                .await
                .map_err(StoreError::Hashing)?;
            let id = Uuid::new_v4();
            let created_at = format_timestamp(OffsetDateTime::now_utc())
                .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO users (id, email, password_hash, first_name, last_name, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.to_string())
            .bind(email)
            .bind(hash)
            .bind(first_name)
            .bind(last_name)
            .bind(created_at)
            .execute(&self.db)
            .await?;

            debug!(user_id = %id, "user inserted");
            Ok(())
        })
        .await
    }

    pub async fn find_one_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.bounded(async {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, created_at
                FROM users
                WHERE id = ?
                "#,
            )
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
            into_user(row)
        })
        .await
    }

    /// Exact match; callers normalize the email first.
    pub async fn find_one_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.bounded(async {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, created_at
                FROM users
                WHERE email = ?
                "#,
            )
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
            into_user(row)
        })
        .await
    }

    /// All users in insertion order. Diagnostic use only.
    #[allow(dead_code)]
    pub async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        self.bounded(async {
            let rows = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, created_at
                FROM users
                ORDER BY rowid
                "#,
            )
            .fetch_all(&self.db)
            .await?;
            rows.into_iter().map(into_user).collect()
        })
        .await
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(|e| {
        error!(error = %e, "corrupt user row");
        StoreError::InvalidRecord(e)
    })
}
