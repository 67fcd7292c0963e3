pub mod cleanup;
pub mod collect;
pub mod config;

use crate::models::CollectorConfig;

/// Load configuration from the environment and start logging, or exit
pub(crate) fn load_config() -> CollectorConfig {
    match CollectorConfig::from_env() {
        Ok(config) => {
            crate::init_tracing(&config.log_level);
            config
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}
