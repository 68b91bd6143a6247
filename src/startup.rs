use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthService;
use crate::configuration::Settings;
use crate::logger::LoggerMiddleware;
use crate::metrics::{metrics_endpoint, Metrics, MetricsMiddleware};
use crate::middleware::JwtMiddleware;
use crate::routes::{
    get_current_user, health_check, json_error_handler, login, logout, refresh, register, ApiDoc,
};
use crate::store::{RefreshTokenStore, UserRepository};

pub fn run(
    listener: TcpListener,
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn RefreshTokenStore>,
    metrics: Arc<Metrics>,
    settings: &Settings,
) -> Result<Server, std::io::Error> {
    let service = AuthService::new(
        users,
        tokens,
        &settings.jwt,
        settings.application.request_timeout(),
    );
    let codec = service.codec().clone();
    let service = web::Data::new(service);
    let metrics_data = web::Data::from(metrics.clone());
    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(MetricsMiddleware::new(metrics.clone()))
            .wrap(LoggerMiddleware)
            .app_data(service.clone())
            .app_data(metrics_data.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("/health_check", web::get().to(health_check))
            // Registered ahead of the /api/v1 scope, which would otherwise claim the prefix
            .service(
                SwaggerUi::new("/api/v1/swagger/{_:.*}")
                    .url("/api/v1/swagger/doc.json", openapi.clone()),
            )
            .service(
                web::scope("/api/v1")
                    // Public routes
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/register", web::post().to(register))
                    .route("/metrics", web::get().to(metrics_endpoint))
                    // Protected routes
                    .service(
                        web::scope("/users")
                            .wrap(JwtMiddleware::new(codec.clone()))
                            .route("/me", web::get().to(get_current_user)),
                    ),
            )
    })
    .shutdown_timeout(settings.application.shutdown_timeout)
    .listen(listener)?
    .run();

    Ok(server)
}
