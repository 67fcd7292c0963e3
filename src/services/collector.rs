//! Collection orchestrator
//!
//! Drives one collection run end to end: plan, fetch, merge, persist.
//!
//! Features:
//! - Per-asset quote runs over every (currency, symbol batch) pair
//! - Global market snapshot runs, one request per currency
//! - Strictly sequential requests with a fixed pause between consecutive calls
//! - Partial failures are recorded and logged; the run still succeeds as long
//!   as something was collected
//! - Pipeline pass that runs both kinds and writes an execution record
//!
//! Each run owns its own transport instance and closes it on every exit path.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::constants::{
    DAILY_API_CALL_LIMIT, GLOBAL_METRICS_FILE_PREFIX, PRICES_FILE_PREFIX,
};
use crate::error::{AppError, Result};
use crate::models::{
    CollectionKind, CollectionRunSummary, CollectorConfig, EnrichedRecord, GlobalSnapshot,
    PipelineExecution,
};
use crate::services::batch_planner::plan_requests;
use crate::services::merge_engine::{BatchOutcome, GlobalMerger, QuoteMerger};
use crate::services::record_sink::RecordSink;
use crate::services::transport::{CoinMarketCapClient, RetryPolicy, TransportError};
use crate::utils::timestamped_filename;

pub struct CryptoCollector {
    config: CollectorConfig,
    sink: RecordSink,
    retry: RetryPolicy,
}

impl CryptoCollector {
    /// Validate the configuration and prepare the output directories
    pub fn new(config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        let sink = RecordSink::new(&config.data_base_path)?;

        info!(
            symbols = config.symbols.len(),
            currencies = ?config.currencies,
            data_dir = %config.data_base_path.display(),
            "Crypto collector initialized"
        );

        Ok(Self {
            config,
            sink,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the transport retry schedule for every run
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn sink(&self) -> &RecordSink {
        &self.sink
    }

    fn client(&self) -> Result<CoinMarketCapClient> {
        Ok(CoinMarketCapClient::new(&self.config)?.with_retry_policy(self.retry))
    }

    async fn pace(&self) {
        if !self.config.request_pacing.is_zero() {
            sleep(self.config.request_pacing).await;
        }
    }

    /// One per-asset quote run
    #[instrument(skip(self), fields(kind = "prices"))]
    pub async fn collect_prices(&self) -> Result<CollectionRunSummary> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        info!(
            symbols = self.config.symbols.len(),
            currencies = self.config.currencies.len(),
            "Starting price collection"
        );

        let mut client = self.client()?;
        let fetched = self.fetch_quotes(&mut client, started_at).await;
        let api_calls = client.request_count();
        client.close();
        let merger = fetched?;

        let (records, failed) = merger.into_parts();
        if records.is_empty() {
            error!(api_calls = api_calls, "No price data collected");
            return Err(AppError::NoData(format!(
                "no quotes returned for any of {} symbols",
                self.config.symbols.len()
            )));
        }

        let filename = timestamped_filename(PRICES_FILE_PREFIX, started_at);
        let output_path = self.sink.write_ndjson(&records, &filename)?;

        self.log_price_headline(&records);
        self.check_quota(api_calls);

        let failed: Vec<String> = failed.into_iter().collect();
        if !failed.is_empty() {
            warn!(failed = ?failed, "Some symbols could not be fully collected");
        }

        let summary = CollectionRunSummary {
            kind: CollectionKind::Prices,
            records_extracted: records.len(),
            records_valid: records.len(),
            execution_time_seconds: start_time.elapsed().as_secs_f64(),
            api_calls,
            failed,
            output_path,
        };

        info!(
            records = summary.records_valid,
            api_calls = summary.api_calls,
            elapsed = %format!("{:.2}s", summary.execution_time_seconds),
            "Price collection completed"
        );
        Ok(summary)
    }

    async fn fetch_quotes(
        &self,
        client: &mut CoinMarketCapClient,
        started_at: DateTime<Utc>,
    ) -> Result<QuoteMerger> {
        let plan = plan_requests(
            &self.config.symbols,
            &self.config.currencies,
            self.config.batch_size,
        );
        let mut merger = QuoteMerger::new();

        for (i, request) in plan.iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }

            info!(
                currency = %request.currency,
                batch = request.batch_index + 1,
                batches = request.batch_count,
                symbols = request.symbols.len(),
                "Fetching quotes"
            );

            let outcome = match client.quotes_latest(&request.symbols, &request.currency).await {
                Ok(data) => merger.merge_at(&request.currency, &request.symbols, &data, started_at),
                Err(e @ (TransportError::Client(_) | TransportError::Closed)) => {
                    return Err(e.into())
                }
                Err(e) => merger.record_batch_failure(&request.symbols, &e.to_string()),
            };
            log_outcome(&request.currency, &outcome);
        }

        Ok(merger)
    }

    /// One global market snapshot run
    #[instrument(skip(self), fields(kind = "global_metrics"))]
    pub async fn collect_global_metrics(&self) -> Result<CollectionRunSummary> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        info!(
            currencies = self.config.currencies.len(),
            "Starting global metrics collection"
        );

        let mut client = self.client()?;
        let fetched = self.fetch_global(&mut client, started_at).await;
        let api_calls = client.request_count();
        client.close();
        let merger = fetched?;

        let (snapshot, failed) = merger.finalize();
        let Some(snapshot) = snapshot else {
            error!(failed = ?failed, "No global metrics collected");
            return Err(AppError::NoData(format!(
                "global metrics failed for every currency: {}",
                failed.join(", ")
            )));
        };

        let filename = timestamped_filename(GLOBAL_METRICS_FILE_PREFIX, started_at);
        let output_path = self
            .sink
            .write_ndjson(std::slice::from_ref(&snapshot), &filename)?;

        self.log_global_headline(&snapshot);
        self.check_quota(api_calls);

        let summary = CollectionRunSummary {
            kind: CollectionKind::GlobalMetrics,
            records_extracted: 1,
            records_valid: 1,
            execution_time_seconds: start_time.elapsed().as_secs_f64(),
            api_calls,
            failed,
            output_path,
        };

        info!(
            api_calls = summary.api_calls,
            elapsed = %format!("{:.2}s", summary.execution_time_seconds),
            "Global metrics collection completed"
        );
        Ok(summary)
    }

    async fn fetch_global(
        &self,
        client: &mut CoinMarketCapClient,
        started_at: DateTime<Utc>,
    ) -> Result<GlobalMerger> {
        let mut merger = GlobalMerger::new(started_at);

        for (i, currency) in self.config.currencies.iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }

            info!(currency = %currency, "Fetching global metrics");
            let outcome = match client.global_metrics_latest(currency).await {
                Ok(data) => merger.merge(currency, &data),
                Err(e @ (TransportError::Client(_) | TransportError::Closed)) => {
                    return Err(e.into())
                }
                Err(e) => merger.record_failure(currency, &e.to_string()),
            };
            log_outcome(currency, &outcome);
        }

        Ok(merger)
    }

    /// Run both collections and record the pass as a `pipeline_execution` file.
    ///
    /// The two kinds are independent: a failed price run does not skip the
    /// global snapshot, or the other way round. The success record is written
    /// only when both succeed; otherwise a failure record carrying every error
    /// message is written and the first error is returned. Failing to write
    /// the execution record never fails the pass.
    pub async fn run_pipeline(&self) -> Result<PipelineExecution> {
        self.run_pipeline_at(Utc::now()).await
    }

    pub(crate) async fn run_pipeline_at(&self, started_at: DateTime<Utc>) -> Result<PipelineExecution> {
        info!("Starting crypto data collection pipeline");

        let prices = self.collect_prices().await;
        let global = self.collect_global_metrics().await;

        let (prices, global) = match (prices, global) {
            (Ok(prices), Ok(global)) => (prices, global),
            (prices, global) => {
                let errors: Vec<AppError> = [prices.err(), global.err()].into_iter().flatten().collect();
                let message = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                error!(error = %message, "Pipeline failed");

                let execution = PipelineExecution::failure(
                    message.clone(),
                    self.config.symbols.len(),
                    self.config.currencies.len(),
                );
                self.save_execution(&execution, started_at);

                return Err(errors
                    .into_iter()
                    .next()
                    .unwrap_or(AppError::Other(message)));
            }
        };

        let execution = PipelineExecution::from_summaries(
            &prices,
            &global,
            self.config.symbols.len(),
            self.config.currencies.len(),
        );
        self.save_execution(&execution, started_at);
        info!(
            records = execution.records_processed,
            api_calls = execution.api_calls_used,
            duration = execution.execution_duration_seconds,
            "Pipeline completed successfully"
        );
        Ok(execution)
    }

    fn save_execution(&self, execution: &PipelineExecution, at: DateTime<Utc>) {
        if let Err(e) = self.sink.save_pipeline_execution(execution, at) {
            warn!(error = %e, "Failed to log pipeline metrics");
        }
    }

    fn check_quota(&self, api_calls: u64) {
        let projected = self.config.projected_daily_calls(api_calls);
        if projected > DAILY_API_CALL_LIMIT {
            warn!(
                projected = projected,
                limit = DAILY_API_CALL_LIMIT,
                interval_minutes = self.config.collection_interval_minutes,
                "Projected daily API usage exceeds the plan limit"
            );
        }
    }

    fn log_price_headline(&self, records: &[EnrichedRecord]) {
        let Some(currency) = self.config.currencies.first() else {
            return;
        };
        let quote = records
            .iter()
            .find(|r| r.symbol == "BTC")
            .and_then(|r| r.quote(currency));

        if let Some(price) = quote.and_then(|q| q.price) {
            let change = quote.and_then(|q| q.percent_change_24h).unwrap_or(0.0);
            info!("BTC: {:.2} {} ({:+.2}% 24h)", price, currency, change);
        }
    }

    fn log_global_headline(&self, snapshot: &GlobalSnapshot) {
        let Some(currency) = self.config.currencies.first() else {
            return;
        };
        let Some(quote) = snapshot.quote(currency) else {
            return;
        };

        info!(
            "Total market cap: {:.0} {}, 24h volume: {:.0} {}, BTC dominance: {:.2}%",
            quote.total_market_cap.unwrap_or(0.0),
            currency,
            quote.total_volume_24h.unwrap_or(0.0),
            currency,
            snapshot.metadata.btc_dominance.unwrap_or(0.0)
        );
    }
}

fn log_outcome(currency: &str, outcome: &BatchOutcome) {
    match outcome {
        BatchOutcome::Complete { merged } => {
            info!(currency = currency, merged = *merged, "Batch merged");
        }
        BatchOutcome::Partial {
            merged,
            missing,
            currency_gaps,
        } => {
            warn!(
                currency = currency,
                merged = *merged,
                missing = ?missing,
                currency_gaps = ?currency_gaps,
                "Batch partially merged"
            );
        }
        BatchOutcome::Failed { entities, reason } => {
            error!(
                currency = currency,
                entities = *entities,
                reason = %reason,
                "Batch failed"
            );
        }
    }
}
