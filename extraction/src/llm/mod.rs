//! LLM Client + Worker Pool (C3).

pub mod client;
pub mod pool;

pub use client::{CompleteOptions, CompletionResult, Embed, LlmClient};
pub use pool::{Complete, LlmPool};

use crate::config::PriceTable;

/// Dollar cost of one completion call against its provider's per-1k-token price.
/// Providers absent from the table cost nothing (local/test doubles).
pub fn completion_cost(price_table: &PriceTable, call: &CompletionResult) -> f64 {
    price_table
        .get(&call.provider_id)
        .map(|price| {
            (call.input_tokens as f64 / 1000.0) * price.in_per_1k
                + (call.output_tokens as f64 / 1000.0) * price.out_per_1k
        })
        .unwrap_or(0.0)
}
