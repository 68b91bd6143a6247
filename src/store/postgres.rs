/// PostgreSQL-backed user and refresh-token store.
///
/// Tables: see `migrations/`. The `tokens.refresh_token` column holds the
/// SHA-256 digest of the token, never the plaintext.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{RefreshTokenRecord, RefreshTokenStore, User, UserRepository};
use crate::auth::{hash_token, Role};
use crate::configuration::DatabaseSettings;
use crate::error::StoreError;
use crate::metrics::Metrics;

const UNIQUE_VIOLATION: &str = "23505";

/// Build the shared, bounded connection pool
pub async fn get_connection_pool(config: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .max_lifetime(Duration::from_secs(config.max_lifetime))
        .test_before_acquire(true)
        .connect(&config.connection_string())
        .await
}

/// Publish pool size and idle connections to `metrics` every `period`
pub fn spawn_pool_monitor(
    pool: PgPool,
    metrics: Arc<Metrics>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if pool.is_closed() {
                break;
            }
            metrics.observe_pool(pool.size(), pool.num_idle());
        }
    })
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Conflict
            }
            _ => StoreError::Unexpected(err.to_string()),
        }
    }
}

fn parse_role(role: &str) -> Result<Role, StoreError> {
    role.parse::<Role>().map_err(StoreError::Unexpected)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let (id, email, password_hash, role) = sqlx::query_as::<_, (i64, String, String, String)>(
            "SELECT id, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id,
            email,
            password_hash,
            role: parse_role(&role)?,
        })
    }

    async fn find_by_id(&self, user_id: i64) -> Result<User, StoreError> {
        let (id, email, password_hash, role) = sqlx::query_as::<_, (i64, String, String, String)>(
            "SELECT id, email, password_hash, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id,
            email,
            password_hash,
            role: parse_role(&role)?,
        })
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn put(&self, user_id: i64, refresh_token: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tokens (user_id, refresh_token) VALUES ($1, $2)")
            .bind(user_id)
            .bind(hash_token(refresh_token))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(user_id, error = %e, "Failed to store refresh token");
                StoreError::from(e)
            })?;

        Ok(())
    }

    async fn get(&self, refresh_token: &str) -> Result<RefreshTokenRecord, StoreError> {
        let (user_id, role, updated_at) =
            sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
                r#"
                SELECT tokens.user_id, users.role, tokens.updated_at
                FROM tokens
                JOIN users ON tokens.user_id = users.id
                WHERE tokens.refresh_token = $1
                "#,
            )
            .bind(hash_token(refresh_token))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(RefreshTokenRecord {
            user_id,
            role: parse_role(&role)?,
            updated_at,
        })
    }

    async fn rotate(
        &self,
        user_id: i64,
        new_token: &str,
        old_token: &str,
    ) -> Result<(), StoreError> {
        // Single statement: the WHERE clause is the compare half of the swap.
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET refresh_token = $1, updated_at = NOW()
            WHERE user_id = $2 AND refresh_token = $3
            "#,
        )
        .bind(hash_token(new_token))
        .bind(user_id)
        .bind(hash_token(old_token))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete(&self, refresh_token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM tokens WHERE refresh_token = $1")
            .bind(hash_token(refresh_token))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_errors_map_to_store_errors() {
        assert_eq!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound);
        assert_eq!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Timeout);
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unexpected(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::Protocol("unexpected message".to_string())),
            StoreError::Unexpected(_)
        ));
    }

    #[test]
    fn test_unknown_role_is_unexpected() {
        assert_eq!(parse_role("admin"), Ok(Role::Admin));
        assert!(matches!(parse_role("root"), Err(StoreError::Unexpected(_))));
    }
}
