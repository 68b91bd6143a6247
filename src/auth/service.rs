/// Authentication Service
///
/// Exchanges credentials for an access/refresh token pair, registers users
/// and revokes refresh tokens on logout. Refresh-token rotation lives in
/// `rotation.rs`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::auth::jwt::TokenCodec;
use crate::auth::password::{hash_password, verify_dummy_password, verify_password_blocking};
use crate::auth::refresh_token::generate_refresh_token;
use crate::auth::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, StoreError};
use crate::store::{RefreshTokenStore, User, UserRepository};

/// Freshly minted credentials returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AuthService {
    pub(super) users: Arc<dyn UserRepository>,
    pub(super) tokens: Arc<dyn RefreshTokenStore>,
    pub(super) codec: TokenCodec,
    pub(super) refresh_token_expiry: chrono::Duration,
    request_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn RefreshTokenStore>,
        jwt_config: &JwtSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            codec: TokenCodec::new(jwt_config),
            refresh_token_expiry: chrono::Duration::seconds(jwt_config.refresh_token_expiry),
            request_timeout,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Deadline shared by every store call of one operation
    pub(super) fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }

    /// Run a store call, giving up with [`StoreError::Timeout`] at `deadline`
    pub(super) async fn within<T>(
        deadline: Instant,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout_at(deadline, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    pub(super) fn mint_pair(&self, user_id: i64, role: Role) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.codec.generate_access_token(user_id, role)?,
            refresh_token: generate_refresh_token(),
        })
    }

    /// Verify credentials and issue a token pair.
    ///
    /// # Errors
    /// - `AuthError::UserNotFound` / `AuthError::WrongPassword`: both rendered
    ///   to the client as the same generic message
    /// - `AppError::Internal`: the refresh token could not be persisted
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let deadline = self.deadline();

        let user = match Self::within(deadline, self.users.find_by_email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                verify_dummy_password(password.to_string()).await;
                return Err(AuthError::UserNotFound.into());
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await {
            return Err(AuthError::WrongPassword.into());
        }

        let pair = self.mint_pair(user.id, user.role)?;

        // Nothing external has changed yet, so a failure here just drops the pair
        Self::within(deadline, self.tokens.put(user.id, &pair.refresh_token))
            .await
            .map_err(|e| AppError::Internal(format!("failed to persist refresh token: {}", e)))?;

        tracing::info!(user_id = user.id, "User authenticated");
        Ok(pair)
    }

    /// Create a user with the default role, returning the new id
    pub async fn register(&self, email: &str, password: &str) -> Result<i64, AppError> {
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))??;

        let user_id =
            Self::within(self.deadline(), self.users.create(email, &password_hash, Role::User))
                .await?;

        tracing::info!(user_id, "User registered");
        Ok(user_id)
    }

    /// Revoke a refresh token. Unknown tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        Self::within(self.deadline(), self.tokens.delete(refresh_token)).await?;
        tracing::debug!("Refresh token revoked");
        Ok(())
    }

    pub async fn current_user(&self, user_id: i64) -> Result<User, AppError> {
        Ok(Self::within(self.deadline(), self.users.find_by_id(user_id)).await?)
    }
}
