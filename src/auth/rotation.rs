/// Refresh Token Rotation
///
/// Each refresh token is single use. A successful refresh swaps the stored
/// value for a new one; the old value can never be exchanged again.
///
/// ```text
/// Active --refresh--> Active(new value)
/// Active --logout---> Deleted
/// Active --expiry---> Deleted
/// ```

use chrono::Utc;

use crate::auth::service::{AuthService, TokenPair};
use crate::error::{AppError, AuthError, StoreError};

impl AuthService {
    /// Exchange a refresh token for a new access/refresh pair.
    ///
    /// Two requests racing on the same token both pass the lookup, but the
    /// compare-and-swap in the store lets only one of them rotate. The loser
    /// is treated as token reuse: every session of the user is revoked.
    ///
    /// # Errors
    /// - `AuthError::RefreshTokenNotFound`: unknown, already rotated or revoked
    /// - `AuthError::RefreshTokenExpired`: older than the refresh lifetime
    /// - `AuthError::RefreshTokenReused`: lost the rotation race
    pub async fn refresh(&self, old_refresh_token: &str) -> Result<TokenPair, AppError> {
        let deadline = self.deadline();

        let record = Self::within(deadline, self.tokens.get(old_refresh_token))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AppError::Auth(AuthError::RefreshTokenNotFound),
                other => AppError::Store(other),
            })?;

        if record.updated_at + self.refresh_token_expiry < Utc::now() {
            tracing::info!(user_id = record.user_id, "Refresh token expired");
            // The token is refused either way; cleanup failures are only logged
            if let Err(e) = Self::within(deadline, self.tokens.delete(old_refresh_token)).await {
                tracing::error!(
                    user_id = record.user_id,
                    error = %e,
                    "Failed to delete expired refresh token"
                );
            }
            return Err(AuthError::RefreshTokenExpired.into());
        }

        let pair = self.mint_pair(record.user_id, record.role)?;

        match Self::within(
            deadline,
            self.tokens
                .rotate(record.user_id, &pair.refresh_token, old_refresh_token),
        )
        .await
        {
            Ok(()) => {
                tracing::info!(user_id = record.user_id, "Token refreshed");
                Ok(pair)
            }
            Err(StoreError::Conflict) | Err(StoreError::NotFound) => {
                tracing::warn!(
                    user_id = record.user_id,
                    "Refresh token reused, revoking all sessions"
                );
                match Self::within(deadline, self.tokens.delete_all_for_user(record.user_id)).await
                {
                    Ok(revoked) => tracing::warn!(user_id = record.user_id, revoked, "Sessions revoked"),
                    Err(e) => tracing::error!(
                        user_id = record.user_id,
                        error = %e,
                        "Failed to revoke sessions after token reuse"
                    ),
                }
                Err(AuthError::RefreshTokenReused.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
