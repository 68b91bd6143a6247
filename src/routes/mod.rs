mod auth;
mod health_check;

use actix_web::{error::JsonPayloadError, HttpRequest};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::Role;
use crate::error::{AppError, ErrorResponse, ValidationError};

pub use auth::{
    get_current_user, login, logout, refresh, register, AuthResponse, LoginRequest,
    RefreshRequest, RegisterRequest, StatusResponse, UserResponse,
};
pub use health_check::health_check;

/// Render undecodable JSON bodies as 400 with the usual `{"error": ...}` shape
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(ValidationError::Body(err.to_string())).into()
}

/// OpenAPI document served under `/api/v1/swagger`
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::refresh,
        auth::logout,
        auth::register,
        auth::get_current_user,
        health_check::health_check,
    ),
    components(schemas(
        LoginRequest,
        RegisterRequest,
        RefreshRequest,
        AuthResponse,
        StatusResponse,
        UserResponse,
        ErrorResponse,
        Role,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh, logout and registration"),
        (name = "Users", description = "Authenticated user endpoints"),
        (name = "Health", description = "Liveness check")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
