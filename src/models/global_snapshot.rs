use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::api::{GlobalCurrencyQuote, GlobalMetricsData};
use super::quote_map::QuoteMap;

/// Market-wide metadata, taken from the first currency that answered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetadata {
    pub active_cryptocurrencies: Option<u64>,
    pub active_exchanges: Option<u64>,
    pub active_market_pairs: Option<u64>,
    pub btc_dominance: Option<f64>,
    pub eth_dominance: Option<f64>,
    pub defi_volume_24h: Option<f64>,
    pub defi_market_cap: Option<f64>,
    pub stablecoin_volume_24h: Option<f64>,
    pub stablecoin_market_cap: Option<f64>,
    pub last_updated: Option<String>,
}

impl From<&GlobalMetricsData> for GlobalMetadata {
    fn from(d: &GlobalMetricsData) -> Self {
        Self {
            active_cryptocurrencies: d.active_cryptocurrencies,
            active_exchanges: d.active_exchanges,
            active_market_pairs: d.active_market_pairs,
            btc_dominance: d.btc_dominance,
            eth_dominance: d.eth_dominance,
            defi_volume_24h: d.defi_volume_24h,
            defi_market_cap: d.defi_market_cap,
            stablecoin_volume_24h: d.stablecoin_volume_24h,
            stablecoin_market_cap: d.stablecoin_market_cap,
            last_updated: d.last_updated.clone(),
        }
    }
}

/// Aggregate market figures in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalQuote {
    pub total_market_cap: Option<f64>,
    pub total_volume_24h: Option<f64>,
    pub altcoin_volume_24h: Option<f64>,
    pub altcoin_market_cap: Option<f64>,
    pub last_updated: Option<String>,
}

impl From<&GlobalCurrencyQuote> for GlobalQuote {
    fn from(q: &GlobalCurrencyQuote) -> Self {
        Self {
            total_market_cap: q.total_market_cap,
            total_volume_24h: q.total_volume_24h,
            altcoin_volume_24h: q.altcoin_volume_24h,
            altcoin_market_cap: q.altcoin_market_cap,
            last_updated: q.last_updated.clone(),
        }
    }
}

/// Single-entity counterpart of `EnrichedRecord`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub metadata: GlobalMetadata,
    #[serde(default)]
    pub quotes: QuoteMap<GlobalQuote>,
    /// Set once the metadata has been populated
    #[serde(skip)]
    pub metadata_populated: bool,
}

impl GlobalSnapshot {
    pub fn new(observed_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: observed_at,
            metadata: GlobalMetadata::default(),
            quotes: QuoteMap::new(),
            metadata_populated: false,
        }
    }

    pub fn quote(&self, currency: &str) -> Option<&GlobalQuote> {
        self.quotes.get(currency)
    }
}
