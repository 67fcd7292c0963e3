//! Collector Constants
//!
//! Upstream API limits, retry policy defaults and output file naming.
//!
//! ## Free tier budget
//!
//! The reference CoinMarketCap plan allows **333 calls/day** and
//! **10,000 calls/month**. Only one settlement currency may be requested per
//! call, so a run costs `currencies x ceil(symbols / 100)` calls for quotes
//! plus one call per currency for global metrics.

/// Base URL for the CoinMarketCap professional API
pub const DEFAULT_BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-CMC_PRO_API_KEY";

/// Latest quotes by symbol (`symbol=BTC,ETH&convert=USD`)
pub const QUOTES_LATEST_ENDPOINT: &str = "cryptocurrency/quotes/latest";

/// Global market metrics (`convert=USD`)
pub const GLOBAL_METRICS_ENDPOINT: &str = "global-metrics/quotes/latest";

/// Daily call allowance on the free plan
pub const DAILY_API_CALL_LIMIT: u64 = 333;

/// Monthly call allowance on the free plan
pub const MONTHLY_API_CALL_LIMIT: u64 = 10_000;

/// Maximum symbols the quotes endpoint accepts per call
pub const MAX_SYMBOLS_PER_REQUEST: usize = 100;

/// Total attempts per request (first try included)
pub const MAX_ATTEMPTS: u32 = 5;

/// First backoff delay; doubles on every retry
pub const BASE_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound for a single backoff delay
pub const MAX_RETRY_DELAY_SECS: u64 = 60;

/// HTTP statuses treated as transient
pub const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Minimum pause between consecutive requests of one run
pub const DEFAULT_PACING_MS: u64 = 500;

/// Response bodies longer than this are truncated in logs and errors
pub const BODY_PREVIEW_LIMIT: usize = 500;

/// Timestamp format used in output file names (UTC)
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const PRICES_FILE_PREFIX: &str = "crypto_prices";
pub const GLOBAL_METRICS_FILE_PREFIX: &str = "crypto_global_metrics";
pub const PIPELINE_EXECUTION_FILE_PREFIX: &str = "pipeline_execution";

/// `pipeline_type` tag written into execution records
pub const PIPELINE_TYPE: &str = "crypto_data_collection";
