//! Embedding Builder (C9): canonical-text construction and the embed call
//! with bounded retries.

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::llm::Embed;
use crate::retry::{retry_with_backoff, BackoffPolicy};

/// Fixed field order for the canonical embedding text.
const CANONICAL_FIELDS_MAX_CHARS: usize = 2000;

/// Build the canonical text concatenation used as embedding input.
pub fn canonical_text(
    name: &str,
    industry: &str,
    description: &str,
    value_proposition: &str,
    key_services: &[String],
) -> String {
    let mut parts = vec![name.to_string(), industry.to_string(), description.to_string(), value_proposition.to_string()];
    parts.push(key_services.join(", "));

    let joined = parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(". ");
    joined.chars().take(CANONICAL_FIELDS_MAX_CHARS).collect()
}

/// Embed `text`, retrying transport failures up to 3 times before giving
/// up (caller then marks the record `partial` with `embedding: null`).
pub async fn embed_with_retry(
    client: &dyn Embed,
    config: &EmbeddingConfig,
    text: &str,
) -> EmbeddingResult<Vec<f32>> {
    let policy = BackoffPolicy::new(3);
    let model = config.model_id.clone();
    let dimension = config.dimension;

    let vector = retry_with_backoff(
        policy,
        rand_fraction,
        |_: &EmbeddingError| true,
        || async {
            client.embed(text, &model).await.map_err(|e| EmbeddingError::Provider(e.to_string()))
        },
    )
    .await?;

    if vector.len() != dimension {
        return Err(EmbeddingError::DimensionMismatch { expected: dimension, got: vector.len() });
    }

    Ok(vector)
}

fn rand_fraction() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_joins_fields_in_order() {
        let text = canonical_text("Acme", "Widgets", "We make widgets.", "Fast widgets", &["support".into(), "repair".into()]);
        assert!(text.starts_with("Acme. Widgets. We make widgets. Fast widgets. support, repair"));
    }

    #[test]
    fn canonical_text_skips_empty_fields() {
        let text = canonical_text("Acme", "", "", "", &[]);
        assert_eq!(text, "Acme");
    }

    #[test]
    fn canonical_text_is_capped() {
        let long = "x".repeat(5000);
        let text = canonical_text("Acme", "", &long, "", &[]);
        assert!(text.len() <= CANONICAL_FIELDS_MAX_CHARS);
    }

    proptest::proptest! {
        #[test]
        fn canonical_text_never_exceeds_cap(
            description in ".{0,6000}",
            value_prop in ".{0,6000}",
        ) {
            let text = canonical_text("Acme", "Widgets", &description, &value_prop, &[]);
            proptest::prop_assert!(text.chars().count() <= CANONICAL_FIELDS_MAX_CHARS);
        }
    }
}
