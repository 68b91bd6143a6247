/// In-process store with the same semantics as [`super::PgStore`].
///
/// One mutex guards users and tokens together, which makes the token lookup
/// join and the rotation compare-and-swap atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RefreshTokenRecord, RefreshTokenStore, User, UserRepository};
use crate::auth::{hash_token, Role};
use crate::error::StoreError;

struct TokenRow {
    user_id: i64,
    token_hash: String,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    last_user_id: i64,
    users: HashMap<i64, User>,
    tokens: Vec<TokenRow>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unexpected("store lock poisoned".to_string()))
    }

    /// Change a user's role, as an administrator would in the users table
    pub fn set_role(&self, user_id: i64, role: Role) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.role = role;
        Ok(())
    }

    /// Number of refresh-token rows held for a user
    pub fn token_count(&self, user_id: i64) -> Result<usize, StoreError> {
        let state = self.lock()?;
        Ok(state.tokens.iter().filter(|row| row.user_id == user_id).count())
    }

    #[cfg(test)]
    pub(crate) fn backdate_tokens(&self, user_id: i64, by: chrono::Duration) {
        let mut state = self.lock().unwrap();
        for row in state.tokens.iter_mut().filter(|row| row.user_id == user_id) {
            row.updated_at = row.updated_at - by;
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let state = self.lock()?;
        state
            .users
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, user_id: i64) -> Result<User, StoreError> {
        let state = self.lock()?;
        state.users.get(&user_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        if state.users.values().any(|user| user.email == email) {
            return Err(StoreError::Conflict);
        }

        state.last_user_id += 1;
        let id = state.last_user_id;
        state.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                role,
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn put(&self, user_id: i64, refresh_token: &str) -> Result<(), StoreError> {
        let token_hash = hash_token(refresh_token);
        let mut state = self.lock()?;

        if !state.users.contains_key(&user_id) {
            return Err(StoreError::Unexpected(format!(
                "user {} does not exist",
                user_id
            )));
        }
        if state
            .tokens
            .iter()
            .any(|row| row.user_id == user_id && row.token_hash == token_hash)
        {
            return Err(StoreError::Conflict);
        }

        state.tokens.push(TokenRow {
            user_id,
            token_hash,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn get(&self, refresh_token: &str) -> Result<RefreshTokenRecord, StoreError> {
        let token_hash = hash_token(refresh_token);
        let state = self.lock()?;

        let row = state
            .tokens
            .iter()
            .find(|row| row.token_hash == token_hash)
            .ok_or(StoreError::NotFound)?;
        let user = state.users.get(&row.user_id).ok_or(StoreError::NotFound)?;

        Ok(RefreshTokenRecord {
            user_id: row.user_id,
            role: user.role,
            updated_at: row.updated_at,
        })
    }

    async fn rotate(
        &self,
        user_id: i64,
        new_token: &str,
        old_token: &str,
    ) -> Result<(), StoreError> {
        let new_hash = hash_token(new_token);
        let old_hash = hash_token(old_token);
        let mut state = self.lock()?;

        let row = state
            .tokens
            .iter_mut()
            .find(|row| row.user_id == user_id && row.token_hash == old_hash)
            .ok_or(StoreError::Conflict)?;
        row.token_hash = new_hash;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, refresh_token: &str) -> Result<(), StoreError> {
        let token_hash = hash_token(refresh_token);
        let mut state = self.lock()?;
        state.tokens.retain(|row| row.token_hash != token_hash);
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut state = self.lock()?;
        let before = state.tokens.len();
        state.tokens.retain(|row| row.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }
}
