use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::tracker::{SweepReport, Tracker};

/// Drives [`Tracker::check_all`] on a fixed interval.
///
/// Sweeps run one after another inside a single loop, so a new sweep never
/// starts while the previous one is still running.
pub struct Scheduler {
    tracker: Arc<Tracker>,
    interval: Duration,
    check_on_start: bool,
}

impl Scheduler {
    pub fn new(tracker: Arc<Tracker>, interval: Duration) -> Self {
        Self {
            tracker,
            interval,
            check_on_start: false,
        }
    }

    pub fn check_on_start(mut self, enabled: bool) -> Self {
        self.check_on_start = enabled;
        self
    }

    /// Runs until `cancel` fires. An in-flight sweep is abandoned on
    /// cancellation; the store is only written at the end of a sweep.
    pub async fn run(self, cancel: CancellationToken) {
        let first_tick = if self.check_on_start {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = time::interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Price checker started ({:?} interval)", self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Shutdown requested during a price check; abandoning it");
                    break;
                }
                _ = self.tick() => {}
            }

            // The wait is measured from the end of the sweep, however long it ran.
            ticker.reset();
            tracing::debug!("Next price check in {:?}", self.interval);
        }

        tracing::info!("Price checker stopped");
    }

    /// Runs a single sweep. Errors and panics are logged, never propagated.
    pub async fn tick(&self) -> Option<SweepReport> {
        match AssertUnwindSafe(self.tracker.check_all()).catch_unwind().await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                tracing::error!("Error in price check: {}", e);
                None
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                tracing::error!("Price check panicked: {}", reason);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, RecordingNotifier, ScriptedExtractor};
    use crate::tracker::TrackerSettings;
    use crate::models::UserId;

    const URL: &str = "https://www.flipkart.com/kettle/p/itm1";
    const HOUR: Duration = Duration::from_secs(3600);

    struct Fixture {
        store: Arc<MemoryStore>,
        extractor: Arc<ScriptedExtractor>,
        notifier: Arc<RecordingNotifier>,
        tracker: Arc<Tracker>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let extractor = Arc::new(ScriptedExtractor::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let tracker = Arc::new(Tracker::new(
            store.clone(),
            extractor.clone(),
            notifier.clone(),
            TrackerSettings {
                fetch_timeout: Duration::from_secs(30),
                check_delay_min: Duration::ZERO,
                check_delay_max: Duration::ZERO,
            },
        ));
        extractor.set(URL, Some(1000), Some("Kettle"));
        tracker.add_product(&UserId::new("u1"), URL).await.unwrap();
        Fixture {
            store,
            extractor,
            notifier,
            tracker,
        }
    }

    #[tokio::test]
    async fn tick_runs_one_sweep() {
        let f = fixture().await;
        f.extractor.set(URL, Some(900), None);

        let scheduler = Scheduler::new(f.tracker.clone(), HOUR);
        let report = scheduler.tick().await.unwrap();

        assert_eq!(report.alerts, 1);
        assert_eq!(f.notifier.sent().len(), 1);
        assert_eq!(f.store.snapshot()[0].last_price, 900);
    }

    #[tokio::test]
    async fn tick_swallows_errors_and_panics() {
        let f = fixture().await;
        let scheduler = Scheduler::new(f.tracker.clone(), HOUR);

        f.store.fail_reads(true);
        assert!(scheduler.tick().await.is_none());
        f.store.fail_reads(false);

        f.extractor.panic_once();
        assert!(scheduler.tick().await.is_none());

        assert!(scheduler.tick().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_interval_until_cancelled() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Scheduler::new(f.tracker.clone(), HOUR).run(cancel.clone()));

        time::sleep(HOUR / 2).await;
        assert_eq!(f.extractor.calls(URL), 1, "only the add has fetched so far");

        time::sleep(HOUR * 3).await;
        assert_eq!(f.extractor.calls(URL), 4);

        cancel.cancel();
        handle.await.unwrap();

        time::sleep(HOUR * 2).await;
        assert_eq!(f.extractor.calls(URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sweep_is_followed_by_a_full_interval() {
        let f = fixture().await;
        f.extractor.set_delay(Duration::from_secs(20));
        let interval = Duration::from_secs(10);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Scheduler::new(f.tracker.clone(), interval).run(cancel.clone()));

        // First sweep runs from 10s to 30s; the next may not start before 40s.
        time::sleep(Duration::from_secs(35)).await;
        assert_eq!(f.extractor.calls(URL), 2);

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(f.extractor.calls(URL), 3);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn check_on_start_sweeps_immediately() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Scheduler::new(f.tracker.clone(), HOUR)
                .check_on_start(true)
                .run(cancel.clone()),
        );

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.extractor.calls(URL), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sweeps_do_not_stop_the_loop() {
        let f = fixture().await;
        f.store.fail_reads(true);
        let loads_before = f.store.load_count();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Scheduler::new(f.tracker.clone(), HOUR).run(cancel.clone()));

        time::sleep(HOUR * 3 + HOUR / 2).await;
        assert_eq!(f.store.load_count() - loads_before, 3);

        f.store.fail_reads(false);
        f.extractor.panic_once();
        time::sleep(HOUR).await;
        f.extractor.set(URL, Some(800), None);
        time::sleep(HOUR).await;

        assert_eq!(f.notifier.sent().len(), 1);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_a_running_sweep_without_writing() {
        let f = fixture().await;
        let gate = f.extractor.gate(URL);
        f.extractor.set(URL, Some(500), None);
        let saves_before = f.store.save_count();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Scheduler::new(f.tracker.clone(), HOUR)
                .check_on_start(true)
                .run(cancel.clone()),
        );
        gate.entered().await;

        cancel.cancel();
        handle.await.unwrap();
        gate.release();

        assert_eq!(f.store.save_count(), saves_before);
        assert_eq!(f.store.snapshot()[0].last_price, 1000);
        assert!(f.notifier.sent().is_empty());
    }
}
