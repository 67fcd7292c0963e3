pub mod cli;
pub mod commands;
pub mod constants;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, Error, Result};

/// Initialize tracing.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (usually `LOG_LEVEL`)
/// is used. `LOG_FORMAT=json` switches to one JSON object per event.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    // A subscriber may already be installed (tests, embedding binaries)
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectorConfig;

    #[test]
    fn test_init_tracing_from_config_level() {
        let config = CollectorConfig::from_lookup(|key| match key {
            "COINMARKETCAP_API_KEY" => Some("k".to_string()),
            "LOG_LEVEL" => Some("WARN".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.log_level, "warn");
        init_tracing(&config.log_level);
        // Second call finds a subscriber already installed
        init_tracing(&config.log_level);
    }
}
