use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures surfaced to callers of the tracker.
///
/// A duplicate add is reported as an
/// [`AddOutcome`](crate::tracker::AddOutcome), not as an error.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("could not obtain a price for {url}")]
    ExtractionFailed { url: String },

    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] AppError),
}
