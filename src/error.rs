/// Application Error Handling
///
/// Every layer returns its own tagged error type. They are funnelled into
/// [`AppError`] and mapped to an HTTP response exactly once, in
/// [`ErrorHandler::error_response`].
///
/// Response bodies always have the shape `{"error": "<message>"}`.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid email or password";
pub const MISSING_HEADER_MESSAGE: &str = "Authorization header is missing";
pub const INVALID_HEADER_MESSAGE: &str = "Authorization header is invalid";
pub const INVALID_TOKEN_PREFIX: &str = "Authorization token is invalid: ";

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request bodies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(&'static str),
    TooShort(&'static str, usize),
    TooLong(&'static str, usize),
    InvalidFormat(String),
    /// Body could not be decoded at all
    Body(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(msg) => write!(f, "{}", msg),
            ValidationError::Body(msg) => write!(f, "invalid request body: {}", msg),
        }
    }
}

impl StdError for ValidationError {}

/// Failures of token verification. The three kinds are kept apart because
/// callers log and report them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Wrong segment count or undecodable header/claims
    Malformed(String),
    /// Signature mismatch, including tokens signed with an unexpected algorithm
    InvalidSignature,
    /// `exp` is in the past
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Malformed(detail) => write!(f, "token is malformed: {}", detail),
            TokenError::InvalidSignature => write!(f, "token signature is invalid"),
            TokenError::Expired => write!(f, "token is expired"),
        }
    }
}

impl StdError for TokenError {}

/// Sentinel kinds returned by the storage layer. Driver errors are
/// translated into one of these before leaving the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound,
    /// Uniqueness violation, or a compare-and-swap that lost
    Conflict,
    /// The request deadline elapsed while waiting on the store
    Timeout,
    Unexpected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Conflict => write!(f, "record conflict"),
            StoreError::Timeout => write!(f, "store call timed out"),
            StoreError::Unexpected(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// Authentication failures. All of them become 401 at the HTTP boundary;
/// the finer distinctions exist for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UserNotFound,
    WrongPassword,
    MissingHeader,
    InvalidHeader,
    Token(TokenError),
    RefreshTokenNotFound,
    RefreshTokenExpired,
    RefreshTokenReused,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::UserNotFound => write!(f, "user not found"),
            AuthError::WrongPassword => write!(f, "wrong password"),
            AuthError::MissingHeader => write!(f, "{}", MISSING_HEADER_MESSAGE),
            AuthError::InvalidHeader => write!(f, "{}", INVALID_HEADER_MESSAGE),
            AuthError::Token(e) => write!(f, "{}{}", INVALID_TOKEN_PREFIX, e),
            AuthError::RefreshTokenNotFound => write!(f, "refresh token not found"),
            AuthError::RefreshTokenExpired => write!(f, "refresh token expired"),
            AuthError::RefreshTokenReused => write!(f, "refresh token reused"),
        }
    }
}

impl StdError for AuthError {}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Token(err)
    }
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Auth(AuthError),
    Store(StoreError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Auth(AuthError::Token(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned to clients
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self) -> (StatusCode, ErrorResponse);
    /// Log the error; the request id comes from the enclosing `http_request` span
    fn log_error(&self);
}

impl ErrorHandler for AppError {
    fn error_response(&self) -> (StatusCode, ErrorResponse) {
        let (status, message) = match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::UserNotFound | AuthError::WrongPassword => (
                    StatusCode::UNAUTHORIZED,
                    INVALID_CREDENTIALS_MESSAGE.to_string(),
                ),
                AuthError::MissingHeader | AuthError::InvalidHeader | AuthError::Token(_) => {
                    (StatusCode::UNAUTHORIZED, e.to_string())
                }
                AuthError::RefreshTokenNotFound
                | AuthError::RefreshTokenExpired
                | AuthError::RefreshTokenReused => (
                    StatusCode::UNAUTHORIZED,
                    "invalid refresh token".to_string(),
                ),
            },

            AppError::Store(e) => match e {
                StoreError::NotFound => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
                StoreError::Conflict => (StatusCode::CONFLICT, "already exists".to_string()),
                StoreError::Timeout | StoreError::Unexpected(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                ),
            },

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, ErrorResponse::new(message))
    }

    fn log_error(&self) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error = %e, "Validation error");
            }
            AppError::Auth(e @ (AuthError::UserNotFound | AuthError::WrongPassword)) => {
                tracing::warn!(error = %e, "Invalid credentials attempt");
            }
            AppError::Auth(AuthError::RefreshTokenReused) => {
                tracing::warn!("Refresh token reuse detected, user sessions revoked");
            }
            AppError::Auth(e) => {
                tracing::warn!(error = %e, "Authentication error");
            }
            AppError::Store(StoreError::Conflict) => {
                tracing::warn!(error = %self, "Duplicate entry attempt");
            }
            AppError::Store(e) => {
                tracing::error!(error = %e, "Store error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
        }
    }
}

/// Implement ResponseError for Actix-web integration
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.log_error();

        let (status, body) = <Self as ErrorHandler>::error_response(self);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        <Self as ErrorHandler>::error_response(self).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: AppError) -> (u16, String) {
        let (status, body) = <AppError as ErrorHandler>::error_response(&err);
        (status.as_u16(), body.error)
    }

    #[test]
    fn test_credential_failures_are_indistinguishable() {
        assert_eq!(
            message(AuthError::UserNotFound.into()),
            (401, "invalid email or password".to_string())
        );
        assert_eq!(
            message(AuthError::WrongPassword.into()),
            (401, "invalid email or password".to_string())
        );
    }

    #[test]
    fn test_header_messages() {
        assert_eq!(
            message(AuthError::MissingHeader.into()),
            (401, "Authorization header is missing".to_string())
        );
        assert_eq!(
            message(AuthError::InvalidHeader.into()),
            (401, "Authorization header is invalid".to_string())
        );
    }

    #[test]
    fn test_token_errors_keep_their_kind() {
        assert_eq!(
            message(TokenError::Expired.into()),
            (401, "Authorization token is invalid: token is expired".to_string())
        );
        assert_eq!(
            message(TokenError::InvalidSignature.into()),
            (
                401,
                "Authorization token is invalid: token signature is invalid".to_string()
            )
        );
    }

    #[test]
    fn test_store_errors_hide_details() {
        let (status, msg) = message(StoreError::Unexpected("connection reset".into()).into());
        assert_eq!(status, 500);
        assert!(!msg.contains("connection reset"));
        assert_eq!(message(StoreError::Timeout.into()).0, 500);
        assert_eq!(message(StoreError::Conflict.into()).0, 409);
        assert_eq!(message(StoreError::NotFound.into()).0, 401);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let (status, msg) = message(ValidationError::EmptyField("email").into());
        assert_eq!(status, 400);
        assert_eq!(msg, "email is empty");
    }
}
