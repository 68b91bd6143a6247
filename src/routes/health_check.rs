use actix_web::HttpResponse;

/// Liveness check; never touches the store
#[utoipa::path(
    get,
    path = "/health_check",
    responses((status = 200, description = "Service is up")),
    tag = "Health"
)]
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}
