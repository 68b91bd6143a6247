use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::configuration::Environment;

/// Initialise structured logging.
///
/// `local` writes human-readable lines at debug level, `dev` writes JSON at debug
/// level and `prod` writes JSON at info level. `RUST_LOG` overrides the level.
pub fn init_telemetry(environment: Environment) {
    let default_level = match environment {
        Environment::Local | Environment::Dev => "debug",
        Environment::Prod => "info",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match environment {
        Environment::Local => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
            .init(),
        Environment::Dev | Environment::Prod => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout)
                    .json(),
            )
            .init(),
    }
}
