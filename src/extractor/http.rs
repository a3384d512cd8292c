use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;

use crate::error::Result;

use super::{Extraction, Extractor};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
];

const MAX_TITLE_CHARS: usize = 100;

// Wide enough that html2text never wraps a title.
const TEXT_WIDTH: usize = 10_000;

/// Plain HTTP extractor reading the price from page metadata.
pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_page(&self, url: &str) -> Result<Option<String>> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: HTTP {}", url, response.status());
            return Ok(None);
        }

        if response.url().as_str() != url {
            tracing::debug!("{} redirected to {}", url, response.url());
        }

        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn fetch(&self, product_url: &str) -> Option<Extraction> {
        let html = match self.fetch_page(product_url).await {
            Ok(Some(html)) => html,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", product_url, e);
                return None;
            }
        };

        let title = extract_title(&html);
        let Some(price) = extract_price(&html) else {
            let lowered = title.as_deref().unwrap_or_default().to_lowercase();
            if lowered.contains("captcha") || lowered.contains("blocked") {
                tracing::warn!("Request for {} looks blocked by the site", product_url);
            } else {
                tracing::debug!("No price found on {}", product_url);
            }
            return None;
        };

        Some(Extraction { price, title })
    }
}

/// Finds the product price in page metadata, structured data, or a rupee amount.
pub fn extract_price(html: &str) -> Option<u64> {
    let meta_re = Regex::new(
        r#"<meta[^>]*(?:property|itemprop|name)=["'](?:product:price:amount|og:price:amount|price)["'][^>]*content=["']([^"']+)["']"#,
    )
    .ok()?;

    // Also try reverse order (content before property)
    let meta_re2 = Regex::new(
        r#"<meta[^>]*content=["']([^"']+)["'][^>]*(?:property|itemprop|name)=["'](?:product:price:amount|og:price:amount|price)["']"#,
    )
    .ok()?;

    let json_ld_re = Regex::new(r#""price"\s*:\s*"?([0-9][0-9,]*(?:\.[0-9]+)?)"#).ok()?;
    let rupee_re = Regex::new(r"₹\s*([0-9][0-9,]*(?:\.[0-9]+)?)").ok()?;

    [&meta_re, &meta_re2, &json_ld_re, &rupee_re]
        .iter()
        .filter_map(|re| re.captures(html).and_then(|cap| cap.get(1)))
        .find_map(|m| parse_amount(m.as_str()))
}

/// Parses "1,29,999.00" style amounts into whole currency units.
pub fn parse_amount(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let whole = cleaned.split('.').next()?;
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    whole.parse().ok()
}

pub fn extract_title(html: &str) -> Option<String> {
    let og_re = Regex::new(
        r#"<meta[^>]*property=["']og:title["'][^>]*content=["']([^"']+)["']"#,
    )
    .ok()?;
    let h1_re = Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").ok()?;
    let title_re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;

    [&og_re, &h1_re, &title_re]
        .iter()
        .filter_map(|re| re.captures(html).and_then(|cap| cap.get(1)))
        .filter_map(|m| html_to_text(m.as_str()))
        .find(|t| !t.is_empty())
}

/// Flattens an HTML fragment to a single line of plain text.
fn html_to_text(fragment: &str) -> Option<String> {
    let text = match html2text::config::plain().string_from_read(fragment.as_bytes(), TEXT_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    Some(
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_from_meta_tags_in_either_attribute_order() {
        let html = r#"<meta property="product:price:amount" content="1,299.00">"#;
        assert_eq!(extract_price(html), Some(1299));

        let html = r#"<meta content="74999" itemprop="price" />"#;
        assert_eq!(extract_price(html), Some(74999));
    }

    #[test]
    fn price_from_structured_data() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Product","offers":{"@type":"Offer","price":"15999","priceCurrency":"INR"}}
        </script>"#;
        assert_eq!(extract_price(html), Some(15999));
    }

    #[test]
    fn price_from_rupee_amount_with_indian_grouping() {
        let html = r#"<div class="x"><span>₹1,29,999</span><span>₹1,49,999</span></div>"#;
        assert_eq!(extract_price(html), Some(129999));
    }

    #[test]
    fn no_price_on_page() {
        assert_eq!(extract_price("<html><body>Out of stock</body></html>"), None);
    }

    #[test]
    fn parse_amount_discards_fraction() {
        assert_eq!(parse_amount("499.99"), Some(499));
        assert_eq!(parse_amount(" 2,000 "), Some(2000));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn title_prefers_og_title_and_decodes_entities() {
        let html = r#"<head><title>Shop</title>
            <meta property="og:title" content="Tea &amp; Coffee Maker"></head>
            <h1>Other</h1>"#;
        assert_eq!(extract_title(html).as_deref(), Some("Tea & Coffee Maker"));
    }

    #[test]
    fn title_falls_back_to_heading_without_markup() {
        let html = "<h1 class=\"name\">\n  <span>Noise   Cancelling</span> Headphones\n</h1>";
        assert_eq!(
            extract_title(html).as_deref(),
            Some("Noise Cancelling Headphones")
        );
    }

    #[test]
    fn title_decodes_numeric_and_named_entities() {
        let html = "<title>Men&#039;s Running Shoe &#x27;Pro&#x27; &ndash; Blue</title>";
        assert_eq!(
            extract_title(html).as_deref(),
            Some("Men's Running Shoe 'Pro' \u{2013} Blue")
        );
    }

    #[test]
    fn title_is_truncated() {
        let long = "x".repeat(250);
        let html = format!("<title>{long}</title>");
        assert_eq!(extract_title(&html).unwrap().chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn empty_page_has_no_title() {
        assert_eq!(extract_title("<title>   </title>"), None);
    }
}
