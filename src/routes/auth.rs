/// Authentication Routes
///
/// Login, token refresh, logout, registration and the current identity.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{AuthService, AuthenticatedUser, Role, TokenPair};
use crate::error::{AppError, ErrorResponse};
use crate::validators::{is_valid_email, is_valid_secret};

/// User login request
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User registration request
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh / logout request
#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: TokenPair, expires_in: i64) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// User information response
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
/// POST /api/v1/login
///
/// # Errors
/// - 400: Validation error (malformed body or email)
/// - 401: Unknown email or wrong password, reported identically
/// - 500: Internal server error
pub async fn login(
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_secret("password", &form.password)?;

    let pair = auth.authenticate(&email, &form.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, auth.codec().access_token_expiry())))
}

#[utoipa::path(
    post,
    path = "/api/v1/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
/// POST /api/v1/refresh
///
/// Exchanges a refresh token for a new pair; the submitted token is consumed.
///
/// # Errors
/// - 400: Validation error
/// - 401: Unknown, expired, already used or revoked refresh token
/// - 500: Internal server error
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    is_valid_secret("refresh_token", &form.refresh_token)?;

    let pair = auth.refresh(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, auth.codec().access_token_expiry())))
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Refresh token revoked", body = StatusResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
/// POST /api/v1/logout
///
/// Revokes a refresh token. Succeeds for tokens that are already gone.
pub async fn logout(
    form: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    is_valid_secret("refresh_token", &form.refresh_token)?;

    auth.logout(&form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        status: "OK".to_string(),
        id: None,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = StatusResponse),
        (status = 400, description = "Invalid email or weak password", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Auth"
)]
/// POST /api/v1/register
///
/// # Errors
/// - 400: Invalid email or weak password
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;

    let id = auth.register(&email, &form.password).await?;

    Ok(HttpResponse::Created().json(StatusResponse {
        status: "OK".to_string(),
        id: Some(id),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
/// GET /api/v1/users/me
///
/// **Requires valid JWT access token**; the identity is injected by the
/// JWT middleware.
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = auth.current_user(user.user_id).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id,
        email: user.email,
        role: user.role,
    }))
}
