use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};

/// Shown when a page yields a price but no usable product name.
pub const PLACEHOLDER_TITLE: &str = "Unknown Product";

/// Opaque identifier of the chat that owns a tracked item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

// Older data files stored Telegram chat ids as bare numbers.
impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => UserId(s),
            Repr::Number(n) => UserId(n.to_string()),
        })
    }
}

/// One product watched by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    #[serde(rename = "chat_id")]
    pub user_id: UserId,
    #[serde(rename = "product_link")]
    pub product_url: String,
    #[serde(default = "placeholder_title")]
    pub title: String,
    pub initial_price: u64,
    pub last_price: u64,
    #[serde(rename = "added_date", with = "timestamp")]
    pub added_at: DateTime<Utc>,
    #[serde(
        rename = "last_checked",
        default,
        with = "timestamp::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked_at: Option<DateTime<Utc>>,
}

fn placeholder_title() -> String {
    PLACEHOLDER_TITLE.to_string()
}

impl TrackedItem {
    /// Creates a freshly added item whose last price equals its initial price.
    pub fn new(
        user_id: UserId,
        product_url: &str,
        title: Option<String>,
        price: u64,
        added_at: DateTime<Utc>,
    ) -> Result<Self> {
        if user_id.as_str().trim().is_empty() {
            return Err(AppError::InvalidItem("user id is empty".to_string()));
        }
        let product_url = product_url.trim();
        if product_url.is_empty() {
            return Err(AppError::InvalidItem("product URL is empty".to_string()));
        }

        Ok(Self {
            user_id,
            product_url: product_url.to_string(),
            title: title
                .filter(|t| is_usable_title(t))
                .unwrap_or_else(placeholder_title),
            initial_price: price,
            last_price: price,
            added_at,
            last_checked_at: None,
        })
    }

    pub fn is_keyed(&self, user_id: &UserId, product_url: &str) -> bool {
        self.user_id == *user_id && self.product_url == product_url
    }

    pub fn same_key(&self, other: &TrackedItem) -> bool {
        self.is_keyed(&other.user_id, &other.product_url)
    }
}

pub fn is_usable_title(title: &str) -> bool {
    let title = title.trim();
    !title.is_empty() && title != PLACEHOLDER_TITLE
}

/// A price decrease between two successful observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceDrop {
    pub old_price: u64,
    pub new_price: u64,
    pub discount: u64,
    pub discount_percent: f64,
}

impl PriceDrop {
    /// Returns `None` unless `new_price` is strictly below `old_price`.
    pub fn between(old_price: u64, new_price: u64) -> Option<Self> {
        if new_price >= old_price {
            return None;
        }
        let discount = old_price - new_price;
        Some(Self {
            old_price,
            new_price,
            discount,
            discount_percent: discount as f64 / old_price as f64 * 100.0,
        })
    }
}

/// `YYYY-MM-DD HH:MM:SS` in UTC on disk; RFC 3339 is accepted on read.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, FORMAT) {
            return Some(naive.and_utc());
        }
        None
    }

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {s}")))
    }

    pub mod optional {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => super::parse(&s)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {s}"))),
                None => Ok(None),
            }
        }
    }
}
