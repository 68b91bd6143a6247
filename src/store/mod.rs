/// Persistence boundary
///
/// Users are read (and created on registration); refresh tokens are put,
/// looked up, rotated with compare-and-swap and deleted. Implementations
/// translate their driver errors into [`StoreError`] sentinels and hash
/// refresh tokens before they touch storage.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::Role;
use crate::error::StoreError;

pub use memory::InMemoryStore;
pub use postgres::{get_connection_pool, spawn_pool_monitor, PgStore};

/// A row of the users table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Result of a refresh-token lookup. The role is read live from the users
/// table, so a role change applies from the next refresh on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: i64,
    pub role: Role,
    /// Creation or last rotation time
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn find_by_id(&self, user_id: i64) -> Result<User, StoreError>;

    /// Insert a user, returning its id. Duplicate email → [`StoreError::Conflict`].
    async fn create(&self, email: &str, password_hash: &str, role: Role)
        -> Result<i64, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a row. Fails with [`StoreError::Conflict`] on a uniqueness violation.
    async fn put(&self, user_id: i64, refresh_token: &str) -> Result<(), StoreError>;

    /// Look up a token joined against its user. Missing → [`StoreError::NotFound`].
    async fn get(&self, refresh_token: &str) -> Result<RefreshTokenRecord, StoreError>;

    /// Replace `old_token` with `new_token` for `user_id` only if the row still
    /// holds `old_token`. A lost swap (already rotated or revoked) is
    /// [`StoreError::Conflict`].
    async fn rotate(
        &self,
        user_id: i64,
        new_token: &str,
        old_token: &str,
    ) -> Result<(), StoreError>;

    /// Remove a token. Deleting an absent token succeeds.
    async fn delete(&self, refresh_token: &str) -> Result<(), StoreError>;

    /// Remove every token of a user, returning how many were removed
    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError>;
}
