//! Request planning
//!
//! The quotes endpoint accepts up to 100 symbols but only one settlement
//! currency per call. A plan iterates currencies in the outer loop and symbol
//! batches in the inner loop, so every batch for currency N is requested
//! before currency N+1. The merge step relies on this order: the first
//! currency to return an asset decides its static metadata.

/// One quotes call: a currency and a contiguous slice of the symbol list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub currency: String,
    pub symbols: Vec<String>,
    /// 0-based batch position within this currency
    pub batch_index: usize,
    /// Number of batches per currency
    pub batch_count: usize,
}

/// Build the ordered request plan. Empty inputs give an empty plan.
pub fn plan_requests(
    symbols: &[String],
    currencies: &[String],
    max_batch_size: usize,
) -> Vec<RequestDescriptor> {
    if symbols.is_empty() || currencies.is_empty() {
        return Vec::new();
    }

    let chunk_size = max_batch_size.max(1);
    let batches: Vec<&[String]> = symbols.chunks(chunk_size).collect();
    let batch_count = batches.len();

    currencies
        .iter()
        .flat_map(|currency| {
            batches
                .iter()
                .enumerate()
                .map(move |(batch_index, chunk)| RequestDescriptor {
                    currency: currency.clone(),
                    symbols: chunk.to_vec(),
                    batch_index,
                    batch_count,
                })
        })
        .collect()
}
