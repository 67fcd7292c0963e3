//! Upstream wire types
//!
//! Shapes of the CoinMarketCap v1 responses consumed by the collector. Every
//! field is optional: the API omits or nulls fields freely and a missing field
//! must never sink a whole batch.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// `status` block present in every response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub credit_count: Option<u64>,
    #[serde(default)]
    pub elapsed: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `{status: {...}, data: {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub status: Option<ApiStatus>,
    #[serde(default)]
    pub data: Value,
}

/// One asset entry of `cryptocurrency/quotes/latest`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetQuote {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub cmc_rank: Option<u32>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub platform: Option<Value>,
    #[serde(default)]
    pub quote: HashMap<String, CurrencyQuote>,
}

/// Nested `quote.<CURRENCY>` block of an asset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrencyQuote {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub volume_change_24h: Option<f64>,
    #[serde(default)]
    pub percent_change_1h: Option<f64>,
    #[serde(default)]
    pub percent_change_24h: Option<f64>,
    #[serde(default)]
    pub percent_change_7d: Option<f64>,
    #[serde(default)]
    pub percent_change_30d: Option<f64>,
    #[serde(default)]
    pub percent_change_60d: Option<f64>,
    #[serde(default)]
    pub percent_change_90d: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_dominance: Option<f64>,
    #[serde(default)]
    pub fully_diluted_market_cap: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// `data` of `global-metrics/quotes/latest`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalMetricsData {
    #[serde(default)]
    pub active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    pub active_exchanges: Option<u64>,
    #[serde(default)]
    pub active_market_pairs: Option<u64>,
    #[serde(default)]
    pub btc_dominance: Option<f64>,
    #[serde(default)]
    pub eth_dominance: Option<f64>,
    #[serde(default)]
    pub defi_volume_24h: Option<f64>,
    #[serde(default)]
    pub defi_market_cap: Option<f64>,
    #[serde(default)]
    pub stablecoin_volume_24h: Option<f64>,
    #[serde(default)]
    pub stablecoin_market_cap: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub quote: HashMap<String, GlobalCurrencyQuote>,
}

/// Nested `quote.<CURRENCY>` block of the global metrics
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalCurrencyQuote {
    #[serde(default)]
    pub total_market_cap: Option<f64>,
    #[serde(default)]
    pub total_volume_24h: Option<f64>,
    #[serde(default)]
    pub altcoin_volume_24h: Option<f64>,
    #[serde(default)]
    pub altcoin_market_cap: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_quote_tolerates_nulls_and_missing_fields() {
        let json = r#"{
            "name": "Bitcoin",
            "symbol": "BTC",
            "cmc_rank": 1,
            "max_supply": 21000000,
            "platform": null,
            "tags": ["mineable"],
            "quote": {"USD": {"price": 65000.5, "percent_change_24h": -1.2, "market_cap": null}}
        }"#;

        let asset: AssetQuote = serde_json::from_str(json).unwrap();
        assert_eq!(asset.name.as_deref(), Some("Bitcoin"));
        assert_eq!(asset.cmc_rank, Some(1));
        assert!(asset.platform.is_none());
        assert!(asset.slug.is_none());

        let usd = asset.quote.get("USD").unwrap();
        assert_eq!(usd.price, Some(65000.5));
        assert!(usd.market_cap.is_none());
    }

    #[test]
    fn test_envelope_without_error_code() {
        let envelope: ApiEnvelope =
            serde_json::from_str(r#"{"status": {"credit_count": 1}, "data": {}}"#).unwrap();
        let status = envelope.status.unwrap();
        assert!(status.error_code.is_none());
        assert_eq!(status.credit_count, Some(1));
    }
}
