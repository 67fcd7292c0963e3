pub mod batch_planner;
pub mod collector;
pub mod merge_engine;
pub mod record_sink;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch_planner::{plan_requests, RequestDescriptor};
pub use collector::CryptoCollector;
pub use merge_engine::{BatchOutcome, CurrencyGap, FailureSet, GlobalMerger, QuoteMerger};
pub use record_sink::{read_ndjson, write_records, FileStats, RecordFormat, RecordSink, SinkError};
pub use transport::{check_envelope, CoinMarketCapClient, EnvelopeGap, RetryPolicy, TransportError};
