//! Price tracking service.
//!
//! Foreground adds and the background sweep share one [`Store`]. Adds take
//! the store lock only for the duplicate check and append; the sweep does
//! its slow extraction work on an unlocked snapshot and reconciles with a
//! fresh reload under the lock at the end.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::config::Config;
use crate::error::{AppError, TrackError};
use crate::extractor::{Extraction, Extractor};
use crate::messages;
use crate::models::{is_usable_title, PriceDrop, TrackedItem, UserId};
use crate::notify::Notifier;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub fetch_timeout: Duration,
    pub check_delay_min: Duration,
    pub check_delay_max: Duration,
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        let (check_delay_min, check_delay_max) = config.check_delay();
        Self {
            fetch_timeout: config.fetch_timeout(),
            check_delay_min,
            check_delay_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(TrackedItem),
    /// The key was already present; `item` is the stored row, untouched.
    AlreadyTracked { item: TrackedItem, current_price: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub alerts: usize,
}

pub struct Tracker {
    store: Arc<dyn Store>,
    extractor: Arc<dyn Extractor>,
    notifier: Arc<dyn Notifier>,
    settings: TrackerSettings,
}

impl Tracker {
    pub fn new(
        store: Arc<dyn Store>,
        extractor: Arc<dyn Extractor>,
        notifier: Arc<dyn Notifier>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            notifier,
            settings,
        }
    }

    pub async fn add_product(
        &self,
        user_id: &UserId,
        product_url: &str,
    ) -> Result<AddOutcome, TrackError> {
        let product_url = product_url.trim();
        if product_url.is_empty() {
            return Err(TrackError::InvalidProduct("product URL is empty".to_string()));
        }

        tracing::debug!("Adding product for chat {}: {}", user_id, product_url);

        let Some(extraction) = self.extract(product_url).await else {
            tracing::warn!("Could not fetch price for {}", product_url);
            return Err(TrackError::ExtractionFailed {
                url: product_url.to_string(),
            });
        };

        let new_item = TrackedItem::new(
            user_id.clone(),
            product_url,
            extraction.title,
            extraction.price,
            Utc::now(),
        )
        .map_err(|e| TrackError::InvalidProduct(e.to_string()))?;

        let mut outcome = None;
        self.store
            .update(Box::new(|items: &mut Vec<TrackedItem>| {
                // A concurrent add of the same key may have committed while
                // we were fetching.
                if let Some(existing) = items.iter().find(|i| i.same_key(&new_item)) {
                    outcome = Some(AddOutcome::AlreadyTracked {
                        item: existing.clone(),
                        current_price: new_item.last_price,
                    });
                    return false;
                }
                items.push(new_item.clone());
                outcome = Some(AddOutcome::Added(new_item));
                true
            }))
            .await
            .map_err(|e| {
                tracing::error!("Failed to save new product {}: {}", product_url, e);
                TrackError::StoreUnavailable(e)
            })?;

        let outcome = outcome.ok_or_else(|| {
            TrackError::StoreUnavailable(AppError::Other(anyhow::anyhow!(
                "store returned without applying the update"
            )))
        })?;
        if let AddOutcome::Added(item) = &outcome {
            tracing::info!(
                "Product added for chat {}: {} at {}",
                user_id,
                item.title,
                item.last_price
            );
        }
        Ok(outcome)
    }

    pub async fn list_products(&self, user_id: &UserId) -> Result<Vec<TrackedItem>, TrackError> {
        let items = self.store.load().await.map_err(TrackError::StoreUnavailable)?;
        Ok(items.into_iter().filter(|i| i.user_id == *user_id).collect())
    }

    /// Re-checks every tracked item once and alerts on price drops.
    pub async fn check_all(&self) -> Result<SweepReport, TrackError> {
        tracing::info!("Starting price check");

        let mut snapshot = self.store.load().await.map_err(|e| {
            tracing::error!("Failed to load products for price check: {}", e);
            TrackError::StoreUnavailable(e)
        })?;

        let mut report = SweepReport {
            total: snapshot.len(),
            ..SweepReport::default()
        };
        if snapshot.is_empty() {
            tracing::info!("No products to check");
            return Ok(report);
        }

        let mut updated = Vec::new();
        for (i, item) in snapshot.iter_mut().enumerate() {
            if i > 0 {
                self.courtesy_pause().await;
            }

            tracing::debug!(url = %item.product_url, "Checking: {}", item.title);
            let Some(extraction) = self.extract(&item.product_url).await else {
                tracing::warn!(url = %item.product_url, "Failed to check price for: {}", item.title);
                report.failed += 1;
                continue;
            };

            tracing::info!(
                "{}: {} (was {})",
                item.title,
                extraction.price,
                item.last_price
            );

            if let Some(drop) = PriceDrop::between(item.last_price, extraction.price) {
                self.notifier
                    .notify(&item.user_id, &messages::price_drop_alert(item, &drop))
                    .await;
                report.alerts += 1;
            }

            item.last_price = extraction.price;
            item.last_checked_at = Some(Utc::now());
            if let Some(title) = extraction.title.filter(|t| is_usable_title(t)) {
                item.title = title;
            }
            report.succeeded += 1;
            updated.push(item.clone());
        }

        if !updated.is_empty() {
            self.merge(updated).await?;
        }

        tracing::info!(
            "Price check complete. Failed: {}/{}, alerts sent: {}",
            report.failed,
            report.total,
            report.alerts
        );
        Ok(report)
    }

    /// Applies sweep results onto a fresh reload of the store.
    ///
    /// Only the mutable fields of items that still exist are patched. Items
    /// added since the snapshot are kept; items removed since are not
    /// brought back.
    async fn merge(&self, updated: Vec<TrackedItem>) -> Result<(), TrackError> {
        self.store
            .update(Box::new(move |current: &mut Vec<TrackedItem>| {
                let mut changed = false;
                for swept in &updated {
                    if let Some(stored) = current.iter_mut().find(|i| i.same_key(swept)) {
                        stored.last_price = swept.last_price;
                        stored.last_checked_at = swept.last_checked_at;
                        stored.title = swept.title.clone();
                        changed = true;
                    } else {
                        tracing::debug!(
                            url = %swept.product_url,
                            "Product disappeared during price check; dropping its update"
                        );
                    }
                }
                changed
            }))
            .await
            .map_err(|e| {
                tracing::error!("Failed to save price check results: {}", e);
                TrackError::StoreUnavailable(e)
            })
    }

    async fn extract(&self, product_url: &str) -> Option<Extraction> {
        match tokio::time::timeout(self.settings.fetch_timeout, self.extractor.fetch(product_url))
            .await
        {
            Ok(extraction) => extraction,
            Err(_) => {
                tracing::warn!(
                    "Timed out after {:?} fetching {}",
                    self.settings.fetch_timeout,
                    product_url
                );
                None
            }
        }
    }

    async fn courtesy_pause(&self) {
        let delay = jittered_delay(self.settings.check_delay_min, self.settings.check_delay_max);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    }
}
