use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DAILY_API_CALL_LIMIT, DEFAULT_BASE_URL, DEFAULT_PACING_MS, MAX_SYMBOLS_PER_REQUEST,
    MONTHLY_API_CALL_LIMIT,
};
use crate::error::{AppError, Result};

use super::crypto_list::{default_symbols, lookup_symbol, parse_list, DEFAULT_FIAT_CURRENCIES};

/// Thresholds consumed by downstream alerting, carried for reporting only
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    /// Price change alert (percent)
    pub price_change_pct: f64,
    /// Minimum 24h volume (USD)
    pub volume_min: f64,
    /// Market cap change (USD)
    pub market_cap_change: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            price_change_pct: 10.0,
            volume_min: 1_000_000.0,
            market_cap_change: 1_000_000_000.0,
        }
    }
}

/// Optional notification targets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationConfig {
    pub alert_email: Option<String>,
    pub slack_webhook_url: Option<String>,
}

/// Immutable collector configuration, built once at process start
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// CoinMarketCap API key
    pub api_key: String,

    /// API base URL (overridable for tests and proxies)
    pub base_url: String,

    /// Asset symbols to collect, in request order
    pub symbols: Vec<String>,

    /// Settlement currencies, in processing order
    pub currencies: Vec<String>,

    /// Symbols per quotes request
    pub batch_size: usize,

    /// Scheduler interval the collector is expected to run at
    pub collection_interval_minutes: u64,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Minimum pause between consecutive requests within a run
    pub request_pacing: Duration,

    /// Root of the data tree (`raw/` and `processed/` live beneath it)
    pub data_base_path: PathBuf,

    pub alert_thresholds: AlertThresholds,

    pub notifications: NotificationConfig,

    pub raw_data_retention_days: u64,

    pub processed_data_retention_days: u64,

    pub log_level: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            symbols: default_symbols(),
            currencies: DEFAULT_FIAT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            batch_size: MAX_SYMBOLS_PER_REQUEST,
            collection_interval_minutes: 15,
            request_timeout: Duration::from_secs(30),
            request_pacing: Duration::from_millis(DEFAULT_PACING_MS),
            data_base_path: PathBuf::from("data"),
            alert_thresholds: AlertThresholds::default(),
            notifications: NotificationConfig::default(),
            raw_data_retention_days: 30,
            processed_data_retention_days: 90,
            log_level: "info".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Build from process environment and validate
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source and validate
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let symbols = match get("CRYPTO_SYMBOLS") {
            Some(s) => parse_list(&s),
            None => defaults.symbols,
        };

        let currencies = match get("FIAT_CURRENCIES") {
            Some(s) => parse_list(&s.to_uppercase()),
            None => defaults.currencies,
        };

        let config = Self {
            api_key: get("COINMARKETCAP_API_KEY").unwrap_or_default(),
            base_url: get("COINMARKETCAP_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            symbols,
            currencies,
            batch_size: defaults.batch_size,
            collection_interval_minutes: parse_var(&get, "CRYPTO_COLLECTION_INTERVAL", 15)?,
            request_timeout: Duration::from_secs(parse_var(&get, "REQUEST_TIMEOUT_SECONDS", 30)?),
            request_pacing: Duration::from_millis(parse_var(
                &get,
                "REQUEST_PACING_MS",
                DEFAULT_PACING_MS,
            )?),
            data_base_path: get("DATA_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_base_path),
            alert_thresholds: AlertThresholds {
                price_change_pct: parse_var(&get, "PRICE_CHANGE_ALERT_THRESHOLD", 10.0)?,
                volume_min: parse_var(&get, "VOLUME_ALERT_THRESHOLD_MIN", 1_000_000.0)?,
                market_cap_change: parse_var(&get, "MARKET_CAP_CHANGE_THRESHOLD", 1_000_000_000.0)?,
            },
            notifications: NotificationConfig {
                alert_email: get("ALERT_EMAIL"),
                slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            },
            raw_data_retention_days: parse_var(&get, "RAW_DATA_RETENTION_DAYS", 30)?,
            processed_data_retention_days: parse_var(&get, "PROCESSED_DATA_RETENTION_DAYS", 90)?,
            log_level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on anything that would make a run pointless
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "COINMARKETCAP_API_KEY environment variable is required. \
                 Get a free API key from https://coinmarketcap.com/api/"
                    .to_string(),
            ));
        }

        if self.symbols.is_empty() {
            return Err(AppError::Config("No cryptocurrencies configured for monitoring".to_string()));
        }

        if self.currencies.is_empty() {
            return Err(AppError::Config("No fiat currencies configured".to_string()));
        }

        if let Some(bad) = self
            .currencies
            .iter()
            .find(|c| c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_uppercase()))
        {
            return Err(AppError::Config(format!(
                "Invalid currency code '{}': expected 3 letters (e.g. USD)",
                bad
            )));
        }

        if self.batch_size == 0 || self.batch_size > MAX_SYMBOLS_PER_REQUEST {
            return Err(AppError::Config(format!(
                "Batch size must be between 1 and {}, got {}",
                MAX_SYMBOLS_PER_REQUEST, self.batch_size
            )));
        }

        if self.collection_interval_minutes == 0 {
            return Err(AppError::Config("Collection interval must be at least 1 minute".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::Config("Request timeout must be greater than zero".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                self.base_url
            )));
        }

        Ok(())
    }

    pub fn raw_data_dir(&self) -> PathBuf {
        self.data_base_path.join("raw")
    }

    pub fn processed_data_dir(&self) -> PathBuf {
        self.data_base_path.join("processed")
    }

    /// Quote calls one run needs: one per currency per symbol batch
    pub fn quote_calls_per_run(&self) -> u64 {
        let batches = self.symbols.len().div_ceil(self.batch_size.max(1));
        (batches * self.currencies.len()) as u64
    }

    /// Global metrics calls one run needs
    pub fn global_calls_per_run(&self) -> u64 {
        self.currencies.len() as u64
    }

    /// Daily call consumption if every scheduled run uses `calls_per_run` calls
    pub fn projected_daily_calls(&self, calls_per_run: u64) -> u64 {
        let runs_per_day = (24 * 60) / self.collection_interval_minutes.max(1);
        runs_per_day * calls_per_run
    }

    /// Human-readable configuration report
    pub fn summary(&self) -> String {
        let configured = |v: &Option<String>| match v {
            Some(s) => format!("configured ({})", s),
            None => "not configured".to_string(),
        };
        let per_run = self.quote_calls_per_run() + self.global_calls_per_run();
        let symbols = self
            .symbols
            .iter()
            .map(|s| match lookup_symbol(s) {
                Some(known) => format!("{} ({})", s, known.name),
                None => s.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Crypto collector configuration\n\
             \n\
             API\n\
             \x20  API key:            {}\n\
             \x20  Base URL:           {}\n\
             \n\
             Cryptocurrencies ({}):\n\
             \x20  {}\n\
             \n\
             Fiat currencies ({}):\n\
             \x20  {}\n\
             \n\
             Collection\n\
             \x20  Interval:           {} minutes\n\
             \x20  Timeout:            {}s\n\
             \x20  Pacing:             {}ms\n\
             \x20  Calls per run:      {}\n\
             \x20  Projected per day:  {} (limit {}/day, {}/month)\n\
             \n\
             Alert thresholds\n\
             \x20  Price change:       >= {}%\n\
             \x20  Min volume:         >= {:.0}\n\
             \x20  Market cap change:  >= {:.0}\n\
             \n\
             Data\n\
             \x20  Raw directory:      {}\n\
             \x20  Raw retention:      {} days\n\
             \x20  Processed retention:{} days\n\
             \n\
             Notifications\n\
             \x20  Email:              {}\n\
             \x20  Slack:              {}\n",
            if self.api_key.is_empty() { "missing" } else { "configured" },
            self.base_url,
            self.symbols.len(),
            symbols,
            self.currencies.len(),
            self.currencies.join(", "),
            self.collection_interval_minutes,
            self.request_timeout.as_secs(),
            self.request_pacing.as_millis(),
            per_run,
            self.projected_daily_calls(per_run),
            DAILY_API_CALL_LIMIT,
            MONTHLY_API_CALL_LIMIT,
            self.alert_thresholds.price_change_pct,
            self.alert_thresholds.volume_min,
            self.alert_thresholds.market_cap_change,
            self.raw_data_dir().display(),
            self.raw_data_retention_days,
            self.processed_data_retention_days,
            configured(&self.notifications.alert_email),
            if self.notifications.slack_webhook_url.is_some() { "configured" } else { "not configured" },
        )
    }
}

fn parse_var<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        None => Ok(default),
    }
}
