//! Tracing subscriber setup for the `icefit` binary.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Load `.env`, then install a fmt subscriber filtered by `RUST_LOG` or
/// `base_level` when it is unset.
pub fn init_logging(base_level: &str) -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(base_level))
        .map_err(|e| AppError::new(2, format!("Invalid log filter '{base_level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::new(2, format!("Logger initialization failed: {e}")))
}
