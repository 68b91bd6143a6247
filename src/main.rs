use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use jwt_auth_service::configuration::get_configuration;
use jwt_auth_service::metrics::Metrics;
use jwt_auth_service::startup::run;
use jwt_auth_service::store::{get_connection_pool, spawn_pool_monitor, PgStore};
use jwt_auth_service::telemetry::init_telemetry;

const POOL_MONITOR_PERIOD: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Telemetry depends on the environment, so configuration comes first
    let configuration = match get_configuration() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    init_telemetry(configuration.application.environment);
    tracing::info!(
        environment = ?configuration.application.environment,
        "Starting application"
    );

    let metrics = Metrics::new().map(Arc::new).map_err(|e| {
        tracing::error!("Failed to register metrics: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Metrics error")
    })?;

    let pool = get_connection_pool(&configuration.database)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;
    tracing::info!("Database connection pool created successfully");

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run database migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    spawn_pool_monitor(pool.clone(), metrics.clone(), POOL_MONITOR_PERIOD);
    let store = Arc::new(PgStore::new(pool));

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, store.clone(), store, metrics, &configuration)?.await
}
