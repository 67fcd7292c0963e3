//! Retention cleanup
//!
//! Usage:
//! - Raw files past the configured retention: `crypto-collector cleanup`
//! - Custom age and pattern: `crypto-collector cleanup --days 7 --pattern 'crypto_prices_*.json'`
//! - Processed directory: `crypto-collector cleanup --processed`

use crate::services::RecordSink;

pub fn run(days: Option<u64>, pattern: String, processed: bool) {
    let config = super::load_config();

    let sink = match RecordSink::new(&config.data_base_path) {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let (dir, default_days) = if processed {
        (sink.processed_dir().to_path_buf(), config.processed_data_retention_days)
    } else {
        (sink.raw_dir().to_path_buf(), config.raw_data_retention_days)
    };
    let days = days.unwrap_or(default_days);

    println!("🧹 Removing '{}' older than {} days from {}", pattern, days, dir.display());

    match sink.cleanup_old_files(&pattern, days, Some(&dir)) {
        Ok(removed) => println!("✅ Removed {} file(s)", removed),
        Err(e) => {
            eprintln!("❌ Cleanup failed: {}", e);
            std::process::exit(1);
        }
    }
}
