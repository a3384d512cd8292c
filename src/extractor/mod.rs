mod http;

use async_trait::async_trait;

pub use http::HttpExtractor;

/// What a product page yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub price: u64,
    pub title: Option<String>,
}

/// Pulls the current price (and, best-effort, the title) for a product URL.
///
/// Ordinary failures such as a missing page, a missing price or a blocked
/// request are reported as `None`. Callers bound every call with a timeout.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, product_url: &str) -> Option<Extraction>;
}
