//! Minimal end-to-end usage example: build a `Runtime`, run a single
//! extraction, print the result. Not part of the library's public
//! contract — copy and adapt for your own entry point.
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example run_extraction --manifest-path extraction/Cargo.toml
//! ```

use extraction::security::ProviderCredentials;
use extraction::{pipeline::CancelToken, Config, Runtime};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "sk-placeholder".to_string());
    let credentials = ProviderCredentials::new(api_key, "gpt-4o-mini");

    let runtime = Runtime::new(Config::new(), credentials).await;
    let input = extraction::CompanyInput::new("Acme Corp").with_website("https://example.com");

    let record = extraction::run_extraction(&runtime, input, CancelToken::new()).await;

    println!("status: {:?}", record.scrape_status);
    println!("pages crawled: {}", record.pages_crawled.len());
    if let Some(error) = &record.scrape_error {
        println!("error: {} ({})", error.message, error.kind);
    }

    runtime.shutdown().await;
}
