//! Shared pieces of the KubeSight workspace.
//!
//! - [`metric`]: families, metrics and flattened samples
//! - [`config`]: the `logging` section and JSON5 loading
//! - [`error`]: errors of the helpers above

pub mod config;
pub mod error;
pub mod metric;

pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use metric::{Labels, Metric, MetricFamily, Sample, sanitize_label_name};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Fails if the level is not a valid
/// filter directive or a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            Error::Logging(format!("invalid log level '{}': {}", config.level, e))
        })?,
    };

    let output = match config.format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
