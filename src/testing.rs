//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{AppError, Result};
use crate::extractor::{Extraction, Extractor};
use crate::models::{TrackedItem, UserId};
use crate::notify::Notifier;
use crate::store::{Mutation, Store};

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<TrackedItem>>,
    lock: tokio::sync::Mutex<()>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    skip_mutations: AtomicBool,
}

impl MemoryStore {
    pub fn snapshot(&self) -> Vec<TrackedItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// `update` returns success without running the mutation.
    pub fn skip_mutations(&self, skip: bool) {
        self.skip_mutations.store(skip, Ordering::SeqCst);
    }

    fn read(&self) -> Result<Vec<TrackedItem>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("disk unavailable")));
        }
        Ok(self.snapshot())
    }

    fn write(&self, items: &[TrackedItem]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other("disk full")));
        }
        *self.items.lock().unwrap() = items.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> Result<Vec<TrackedItem>> {
        let _guard = self.lock.lock().await;
        self.read()
    }

    async fn save(&self, items: &[TrackedItem]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(items)
    }

    async fn update(&self, mutate: Mutation<'_>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.read()?;
        if self.skip_mutations.load(Ordering::SeqCst) {
            return Ok(());
        }
        if mutate(&mut items) {
            self.write(&items)?;
        }
        Ok(())
    }
}

/// Parks one extraction until the test releases it.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    released: Arc<Notify>,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[derive(Default)]
pub struct ScriptedExtractor {
    responses: Mutex<HashMap<String, Option<Extraction>>>,
    calls: Mutex<HashMap<String, usize>>,
    gates: Mutex<HashMap<String, Gate>>,
    delay: Mutex<Duration>,
    panic_next: AtomicBool,
}

impl ScriptedExtractor {
    pub fn set(&self, url: &str, price: Option<u64>, title: Option<&str>) {
        let response = price.map(|price| Extraction {
            price,
            title: title.map(str::to_string),
        });
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// The next fetch of `url` waits until the returned gate is released.
    pub fn gate(&self, url: &str) -> Gate {
        let gate = Gate::default();
        self.gates
            .lock()
            .unwrap()
            .insert(url.to_string(), gate.clone());
        gate
    }

    pub fn panic_once(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn fetch(&self, product_url: &str) -> Option<Extraction> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(product_url.to_string())
            .or_default() += 1;

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("extractor blew up on {product_url}");
        }

        let gate = self.gates.lock().unwrap().remove(product_url);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.released.notified().await;
        }

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .get(product_url)
            .cloned()
            .flatten()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_for(&self, user_id: &UserId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &UserId, text: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((user_id.clone(), text.to_string()));
    }
}
