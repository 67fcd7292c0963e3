use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants::PIPELINE_TYPE;

/// The two collection kinds a scheduler can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Per-asset quotes
    Prices,
    /// Market-wide snapshot
    GlobalMetrics,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Prices => write!(f, "prices"),
            CollectionKind::GlobalMetrics => write!(f, "global_metrics"),
        }
    }
}

/// Outcome of one collection run, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRunSummary {
    pub kind: CollectionKind,
    pub records_extracted: usize,
    pub records_valid: usize,
    pub execution_time_seconds: f64,
    pub api_calls: u64,
    /// Symbols (or currencies, for global runs) that failed at least once
    pub failed: Vec<String>,
    pub output_path: PathBuf,
}

impl CollectionRunSummary {
    /// Compact metrics record republished by the scheduler
    pub fn metrics(&self) -> RunMetrics {
        RunMetrics {
            records_extracted: self.records_extracted,
            records_valid: self.records_valid,
            execution_time_seconds: self.execution_time_seconds,
            api_calls: self.api_calls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub records_extracted: usize,
    pub records_valid: usize,
    pub execution_time_seconds: f64,
    pub api_calls: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// One line of `pipeline_execution_<ts>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecution {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub pipeline_type: String,
    pub records_extracted: usize,
    pub records_processed: usize,
    pub records_failed: usize,
    pub execution_duration_seconds: f64,
    pub api_calls_used: u64,
    pub crypto_records: usize,
    pub global_metrics_records: usize,
    pub cryptocurrencies_monitored: usize,
    pub fiat_currencies: usize,
    #[serde(default)]
    pub failed_symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PipelineExecution {
    /// Combine the two run summaries of a pipeline pass
    pub fn from_summaries(
        prices: &CollectionRunSummary,
        global: &CollectionRunSummary,
        symbols_monitored: usize,
        currencies: usize,
    ) -> Self {
        let total_records = prices.records_valid + global.records_valid;
        let total_time = prices.execution_time_seconds + global.execution_time_seconds;

        Self {
            timestamp: Utc::now(),
            status: ExecutionStatus::Success,
            pipeline_type: PIPELINE_TYPE.to_string(),
            records_extracted: total_records,
            records_processed: total_records,
            records_failed: prices.failed.len(),
            execution_duration_seconds: (total_time * 100.0).round() / 100.0,
            api_calls_used: prices.api_calls + global.api_calls,
            crypto_records: prices.records_valid,
            global_metrics_records: global.records_valid,
            cryptocurrencies_monitored: symbols_monitored,
            fiat_currencies: currencies,
            failed_symbols: prices.failed.clone(),
            error_message: None,
        }
    }

    /// Record for a pass that aborted
    pub fn failure(error_message: String, symbols_monitored: usize, currencies: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            status: ExecutionStatus::Failed,
            pipeline_type: PIPELINE_TYPE.to_string(),
            records_extracted: 0,
            records_processed: 0,
            records_failed: 0,
            execution_duration_seconds: 0.0,
            api_calls_used: 0,
            crypto_records: 0,
            global_metrics_records: 0,
            cryptocurrencies_monitored: symbols_monitored,
            fiat_currencies: currencies,
            failed_symbols: Vec::new(),
            error_message: Some(error_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(kind: CollectionKind, valid: usize, secs: f64, calls: u64, failed: &[&str]) -> CollectionRunSummary {
        CollectionRunSummary {
            kind,
            records_extracted: valid,
            records_valid: valid,
            execution_time_seconds: secs,
            api_calls: calls,
            failed: failed.iter().map(|s| s.to_string()).collect(),
            output_path: PathBuf::from("out.json"),
        }
    }

    #[test]
    fn test_pipeline_execution_totals() {
        let prices = summary(CollectionKind::Prices, 19, 1.234, 2, &["HBAR"]);
        let global = summary(CollectionKind::GlobalMetrics, 1, 0.5, 2, &[]);

        let exec = PipelineExecution::from_summaries(&prices, &global, 20, 2);
        assert_eq!(exec.records_extracted, 20);
        assert_eq!(exec.records_failed, 1);
        assert_eq!(exec.api_calls_used, 4);
        assert_eq!(exec.execution_duration_seconds, 1.73);
        assert_eq!(exec.status, ExecutionStatus::Success);

        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["pipeline_type"], PIPELINE_TYPE);
        assert!(value.get("error_message").is_none());
    }

    #[test]
    fn test_metrics_projection() {
        let s = summary(CollectionKind::Prices, 3, 2.0, 4, &[]);
        let m = s.metrics();
        assert_eq!(m.records_extracted, 3);
        assert_eq!(m.records_valid, 3);
        assert_eq!(m.api_calls, 4);
    }
}
