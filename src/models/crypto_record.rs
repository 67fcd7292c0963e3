use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::api::{AssetQuote, CurrencyQuote};
use super::quote_map::QuoteMap;

/// Price, volume and percent-change figures of one asset in one currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSlice {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_change_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub percent_change_60d: Option<f64>,
    pub percent_change_90d: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_dominance: Option<f64>,
    pub fully_diluted_market_cap: Option<f64>,
    pub last_updated: Option<String>,
}

impl From<&CurrencyQuote> for QuoteSlice {
    fn from(q: &CurrencyQuote) -> Self {
        Self {
            price: q.price,
            volume_24h: q.volume_24h,
            volume_change_24h: q.volume_change_24h,
            percent_change_1h: q.percent_change_1h,
            percent_change_24h: q.percent_change_24h,
            percent_change_7d: q.percent_change_7d,
            percent_change_30d: q.percent_change_30d,
            percent_change_60d: q.percent_change_60d,
            percent_change_90d: q.percent_change_90d,
            market_cap: q.market_cap,
            market_cap_dominance: q.market_cap_dominance,
            fully_diluted_market_cap: q.fully_diluted_market_cap,
            last_updated: q.last_updated.clone(),
        }
    }
}

/// Merged multi-currency view of one asset.
///
/// Static metadata comes from the first currency response that contained the
/// asset and is never overwritten afterwards; only `quotes` grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub rank: Option<u32>,
    pub max_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub last_updated: Option<String>,
    pub date_added: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub platform: Option<Value>,
    #[serde(default)]
    pub quotes: QuoteMap<QuoteSlice>,
}

impl EnrichedRecord {
    /// Start a record from the first response that returned `symbol`
    pub fn from_asset(symbol: &str, asset: &AssetQuote, observed_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: observed_at,
            symbol: symbol.to_string(),
            name: asset.name.clone(),
            slug: asset.slug.clone(),
            rank: asset.cmc_rank,
            max_supply: asset.max_supply,
            circulating_supply: asset.circulating_supply,
            total_supply: asset.total_supply,
            last_updated: asset.last_updated.clone(),
            date_added: asset.date_added.clone(),
            tags: asset.tags.clone().unwrap_or_default(),
            platform: asset.platform.clone(),
            quotes: QuoteMap::new(),
        }
    }

    pub fn quote(&self, currency: &str) -> Option<&QuoteSlice> {
        self.quotes.get(currency)
    }
}
