//! Merge Engine
//!
//! Folds per-currency batch responses into one `EnrichedRecord` per asset and
//! one `GlobalSnapshot` per run.
//!
//! Rules:
//! - The first response containing an asset creates its record and fixes its
//!   static metadata. Later currencies only add quote slices.
//! - A requested symbol absent from a response joins the failure set. Quotes
//!   merged for it under earlier currencies are kept.
//! - A response that has the asset but no `quote.<currency>` block is a
//!   *currency gap*: no slice is added and the symbol is not marked failed.
//! - A batch lost to a transport error never reaches `merge`; the caller marks
//!   the whole batch failed with `record_batch_failure`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::models::api::{AssetQuote, GlobalMetricsData};
use crate::models::{EnrichedRecord, GlobalMetadata, GlobalQuote, GlobalSnapshot, QuoteSlice};

/// Identifiers that failed for at least one requested currency or batch
pub type FailureSet = BTreeSet<String>;

/// Result of folding one request into the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every requested entity came back with the requested currency
    Complete { merged: usize },
    /// Some entities were missing, or came back without the requested currency
    Partial {
        merged: usize,
        missing: Vec<String>,
        currency_gaps: Vec<String>,
    },
    /// The request failed outright; nothing was merged
    Failed { entities: usize, reason: String },
}

impl BatchOutcome {
    pub fn merged(&self) -> usize {
        match self {
            BatchOutcome::Complete { merged } | BatchOutcome::Partial { merged, .. } => *merged,
            BatchOutcome::Failed { .. } => 0,
        }
    }
}

/// A response that returned the entity but not the requested currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyGap {
    pub entity: String,
    pub currency: String,
}

/// Accumulates per-asset records across currencies and batches
#[derive(Debug, Default)]
pub struct QuoteMerger {
    records: Vec<EnrichedRecord>,
    index: HashMap<String, usize>,
    failed: FailureSet,
    gaps: Vec<CurrencyGap>,
}

impl QuoteMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a quotes response requested under `currency` for `requested` symbols
    pub fn merge(
        &mut self,
        currency: &str,
        requested: &[String],
        data: &Map<String, Value>,
    ) -> BatchOutcome {
        self.merge_at(currency, requested, data, Utc::now())
    }

    /// `merge` with an explicit observation instant for new records
    pub fn merge_at(
        &mut self,
        currency: &str,
        requested: &[String],
        data: &Map<String, Value>,
        observed_at: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut merged = 0;
        let mut missing = Vec::new();
        let mut currency_gaps = Vec::new();

        for symbol in requested {
            let Some(asset) = data.get(symbol).and_then(|v| decode_asset(symbol, v)) else {
                warn!(symbol = %symbol, currency = currency, "No data returned for symbol");
                self.failed.insert(symbol.clone());
                missing.push(symbol.clone());
                continue;
            };

            let idx = match self.index.get(symbol) {
                Some(&idx) => idx,
                None => {
                    self.records
                        .push(EnrichedRecord::from_asset(symbol, &asset, observed_at));
                    let idx = self.records.len() - 1;
                    self.index.insert(symbol.clone(), idx);
                    idx
                }
            };

            match asset.quote.get(currency) {
                Some(quote) => {
                    self.records[idx]
                        .quotes
                        .insert(currency, QuoteSlice::from(quote));
                    merged += 1;
                }
                None => {
                    warn!(
                        symbol = %symbol,
                        currency = currency,
                        "Response lacks quote for requested currency"
                    );
                    self.gaps.push(CurrencyGap {
                        entity: symbol.clone(),
                        currency: currency.to_string(),
                    });
                    currency_gaps.push(symbol.clone());
                }
            }
        }

        debug!(
            currency = currency,
            requested = requested.len(),
            merged = merged,
            missing = missing.len(),
            gaps = currency_gaps.len(),
            "Merged batch"
        );

        if missing.is_empty() && currency_gaps.is_empty() {
            BatchOutcome::Complete { merged }
        } else {
            BatchOutcome::Partial {
                merged,
                missing,
                currency_gaps,
            }
        }
    }

    /// Mark every symbol of a batch lost to a transport failure
    pub fn record_batch_failure(&mut self, requested: &[String], reason: &str) -> BatchOutcome {
        self.failed.extend(requested.iter().cloned());
        BatchOutcome::Failed {
            entities: requested.len(),
            reason: reason.to_string(),
        }
    }

    /// Records in first-appearance order plus the failure set.
    ///
    /// Repeated calls without an intervening merge return equal results.
    pub fn finalize(&self) -> (Vec<EnrichedRecord>, FailureSet) {
        (self.records.clone(), self.failed.clone())
    }

    /// Consume the engine, handing the records over without copying
    pub fn into_parts(self) -> (Vec<EnrichedRecord>, FailureSet) {
        (self.records, self.failed)
    }

    pub fn failures(&self) -> &FailureSet {
        &self.failed
    }

    pub fn gaps(&self) -> &[CurrencyGap] {
        &self.gaps
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn decode_asset(symbol: &str, value: &Value) -> Option<AssetQuote> {
    match serde_json::from_value::<AssetQuote>(value.clone()) {
        Ok(asset) => Some(asset),
        Err(e) => {
            warn!(symbol = symbol, error = %e, "Undecodable asset entry; treating as missing");
            None
        }
    }
}

/// Accumulates the single global snapshot across currencies
#[derive(Debug)]
pub struct GlobalMerger {
    snapshot: GlobalSnapshot,
    failed_currencies: Vec<String>,
    gaps: Vec<CurrencyGap>,
    responses: usize,
}

impl Default for GlobalMerger {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl GlobalMerger {
    pub fn new(observed_at: DateTime<Utc>) -> Self {
        Self {
            snapshot: GlobalSnapshot::new(observed_at),
            failed_currencies: Vec::new(),
            gaps: Vec::new(),
            responses: 0,
        }
    }

    /// Fold the metrics returned for `currency`
    pub fn merge(&mut self, currency: &str, data: &GlobalMetricsData) -> BatchOutcome {
        self.responses += 1;

        if !self.snapshot.metadata_populated {
            self.snapshot.metadata = GlobalMetadata::from(data);
            self.snapshot.metadata_populated = true;
        }

        match data.quote.get(currency) {
            Some(quote) => {
                self.snapshot.quotes.insert(currency, GlobalQuote::from(quote));
                BatchOutcome::Complete { merged: 1 }
            }
            None => {
                warn!(currency = currency, "Global metrics lack quote for requested currency");
                self.gaps.push(CurrencyGap {
                    entity: "global".to_string(),
                    currency: currency.to_string(),
                });
                BatchOutcome::Partial {
                    merged: 0,
                    missing: Vec::new(),
                    currency_gaps: vec![currency.to_string()],
                }
            }
        }
    }

    /// Record a currency whose request failed
    pub fn record_failure(&mut self, currency: &str, reason: &str) -> BatchOutcome {
        self.failed_currencies.push(currency.to_string());
        BatchOutcome::Failed {
            entities: 1,
            reason: reason.to_string(),
        }
    }

    /// The snapshot, or `None` when no currency returned anything
    pub fn finalize(&self) -> (Option<GlobalSnapshot>, Vec<String>) {
        let snapshot = (self.responses > 0).then(|| self.snapshot.clone());
        (snapshot, self.failed_currencies.clone())
    }

    pub fn gaps(&self) -> &[CurrencyGap] {
        &self.gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn asset(name: &str, rank: u32, currency: &str, price: f64) -> Value {
        json!({
            "name": name,
            "slug": name.to_lowercase(),
            "cmc_rank": rank,
            "circulating_supply": 1000.0,
            "tags": ["layer-1"],
            "quote": { currency: { "price": price, "percent_change_24h": 1.5 } }
        })
    }

    fn response(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_btc_eth_usd_brl_scenario() {
        let mut merger = QuoteMerger::new();
        let batch = strings(&["BTC", "ETH"]);

        let usd = response(&[
            ("BTC", asset("Bitcoin", 1, "USD", 65000.0)),
            ("ETH", asset("Ethereum", 2, "USD", 3500.0)),
        ]);
        assert_eq!(merger.merge("USD", &batch, &usd), BatchOutcome::Complete { merged: 2 });

        let brl = response(&[("BTC", asset("Bitcoin", 1, "BRL", 350000.0))]);
        let outcome = merger.merge("BRL", &batch, &brl);
        assert_eq!(
            outcome,
            BatchOutcome::Partial {
                merged: 1,
                missing: strings(&["ETH"]),
                currency_gaps: Vec::new(),
            }
        );

        let (records, failed) = merger.finalize();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "BTC");
        assert_eq!(records[0].quotes.keys().collect::<Vec<_>>(), vec!["USD", "BRL"]);
        assert_eq!(records[1].symbol, "ETH");
        assert_eq!(records[1].quotes.keys().collect::<Vec<_>>(), vec!["USD"]);
        assert_eq!(failed.into_iter().collect::<Vec<_>>(), strings(&["ETH"]));
    }

    #[test]
    fn test_static_metadata_comes_from_first_currency() {
        let mut merger = QuoteMerger::new();
        let batch = strings(&["BTC"]);

        merger.merge("USD", &batch, &response(&[("BTC", asset("Bitcoin", 1, "USD", 1.0))]));
        merger.merge("EUR", &batch, &response(&[("BTC", asset("Renamed", 7, "EUR", 2.0))]));

        let (records, _) = merger.finalize();
        assert_eq!(records[0].name.as_deref(), Some("Bitcoin"));
        assert_eq!(records[0].rank, Some(1));
        assert_eq!(records[0].quote("EUR").unwrap().price, Some(2.0));
    }

    #[test]
    fn test_first_success_wins_when_first_currency_missed() {
        let mut merger = QuoteMerger::new();
        let batch = strings(&["SOL"]);

        merger.record_batch_failure(&batch, "HTTP 503");
        merger.merge("BRL", &batch, &response(&[("SOL", asset("Solana", 5, "BRL", 800.0))]));

        let (records, failed) = merger.finalize();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name.as_deref(), Some("Solana"));
        assert_eq!(records[0].quotes.keys().collect::<Vec<_>>(), vec!["BRL"]);
        assert!(failed.contains("SOL"));
    }

    #[test]
    fn test_batch_failure_keeps_existing_quotes() {
        let mut merger = QuoteMerger::new();
        let batch = strings(&["BTC", "ETH"]);

        merger.merge(
            "USD",
            &batch,
            &response(&[
                ("BTC", asset("Bitcoin", 1, "USD", 65000.0)),
                ("ETH", asset("Ethereum", 2, "USD", 3500.0)),
            ]),
        );
        let (before, _) = merger.finalize();

        let outcome = merger.record_batch_failure(&batch, "retries exhausted");
        assert_eq!(outcome.merged(), 0);

        let (after, failed) = merger.finalize();
        assert_eq!(before, after);
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn test_missing_currency_key_is_a_gap_not_a_failure() {
        let mut merger = QuoteMerger::new();
        let batch = strings(&["BTC"]);

        let outcome = merger.merge("BRL", &batch, &response(&[("BTC", asset("Bitcoin", 1, "USD", 1.0))]));
        assert_eq!(
            outcome,
            BatchOutcome::Partial {
                merged: 0,
                missing: Vec::new(),
                currency_gaps: strings(&["BTC"]),
            }
        );

        let (records, failed) = merger.finalize();
        assert_eq!(records.len(), 1);
        assert!(records[0].quotes.is_empty());
        assert!(failed.is_empty());
        assert_eq!(
            merger.gaps(),
            &[CurrencyGap { entity: "BTC".to_string(), currency: "BRL".to_string() }]
        );
    }

    #[test]
    fn test_symbol_lookup_is_case_sensitive() {
        let mut merger = QuoteMerger::new();
        let outcome = merger.merge(
            "USD",
            &strings(&["btc"]),
            &response(&[("BTC", asset("Bitcoin", 1, "USD", 1.0))]),
        );
        assert!(matches!(outcome, BatchOutcome::Partial { ref missing, .. } if missing == &strings(&["btc"])));
        assert!(merger.is_empty());
    }

    #[test]
    fn test_undecodable_entry_counts_as_missing() {
        let mut merger = QuoteMerger::new();
        let outcome = merger.merge(
            "USD",
            &strings(&["BTC"]),
            &response(&[("BTC", json!({"cmc_rank": "first", "quote": {}}))]),
        );
        assert!(matches!(outcome, BatchOutcome::Partial { merged: 0, .. }));
        assert!(merger.failures().contains("BTC"));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut merger = QuoteMerger::new();
        merger.merge(
            "USD",
            &strings(&["BTC", "ETH"]),
            &response(&[("BTC", asset("Bitcoin", 1, "USD", 1.0))]),
        );

        assert_eq!(merger.finalize(), merger.finalize());
    }

    fn global(currency: &str, btc_dominance: f64, market_cap: f64) -> GlobalMetricsData {
        serde_json::from_value(json!({
            "active_cryptocurrencies": 9000,
            "btc_dominance": btc_dominance,
            "quote": { currency: { "total_market_cap": market_cap, "total_volume_24h": 1.0e11 } }
        }))
        .unwrap()
    }

    #[test]
    fn test_global_first_successful_currency_sets_metadata() {
        let mut merger = GlobalMerger::default();

        merger.record_failure("USD", "HTTP 500");
        merger.merge("BRL", &global("BRL", 54.0, 1.2e13));
        merger.merge("EUR", &global("EUR", 99.0, 2.1e12));

        let (snapshot, failed) = merger.finalize();
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.metadata.btc_dominance, Some(54.0));
        assert_eq!(snapshot.quotes.keys().collect::<Vec<_>>(), vec!["BRL", "EUR"]);
        assert_eq!(failed, strings(&["USD"]));
    }

    #[test]
    fn test_global_without_any_response_has_no_snapshot() {
        let mut merger = GlobalMerger::default();
        merger.record_failure("USD", "timeout");

        let (snapshot, failed) = merger.finalize();
        assert!(snapshot.is_none());
        assert_eq!(failed.len(), 1);
    }
}
