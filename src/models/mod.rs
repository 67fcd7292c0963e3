pub mod api;
mod collector_config;
pub mod crypto_list;
mod crypto_record;
mod global_snapshot;
mod quote_map;
mod run_summary;

pub use collector_config::{AlertThresholds, CollectorConfig, NotificationConfig};
pub use crypto_list::{default_symbols, lookup_symbol, CryptoSymbol, DEFAULT_CRYPTO_SYMBOLS};
pub use crypto_record::{EnrichedRecord, QuoteSlice};
pub use global_snapshot::{GlobalMetadata, GlobalQuote, GlobalSnapshot};
pub use quote_map::QuoteMap;
pub use run_summary::{
    CollectionKind, CollectionRunSummary, ExecutionStatus, PipelineExecution, RunMetrics,
};
