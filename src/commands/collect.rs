//! Collection commands
//!
//! Usage:
//! - Quotes only: `crypto-collector prices`
//! - Global snapshot only: `crypto-collector global`
//! - Both plus execution record: `crypto-collector pipeline`
//!
//! The result is printed to stdout as JSON so a scheduler can pick it up.

use serde::Serialize;

use crate::error::Result;
use crate::services::CryptoCollector;

#[derive(Debug, Clone, Copy)]
pub enum Target {
    Prices,
    Global,
    Pipeline,
}

pub fn run(target: Target) {
    let config = super::load_config();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let collector = CryptoCollector::new(config)?;
        match target {
            Target::Prices => to_json(&collector.collect_prices().await?),
            Target::Global => to_json(&collector.collect_global_metrics().await?),
            Target::Pipeline => to_json(&collector.run_pipeline().await?),
        }
    });

    match result {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("❌ Collection failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| crate::error::AppError::Other(e.to_string()))
}
