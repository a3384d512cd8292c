use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::TrackedItem;

use super::{Mutation, Store};

/// Keeps the whole collection in one pretty-printed JSON array.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    // Callers must hold `lock`.
    async fn read_items(&self) -> Result<Vec<TrackedItem>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Creating new data file at {:?}", self.path);
                self.write_items(&[]).await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(
                    "Data file {:?} is unreadable ({}); moving it aside and starting empty",
                    self.path,
                    e
                );
                if let Err(e) = fs::rename(&self.path, self.corrupt_path()).await {
                    tracing::warn!("Failed to keep a copy of the corrupt data file: {}", e);
                }
                self.write_items(&[]).await?;
                Ok(Vec::new())
            }
        }
    }

    // Write-to-temp then rename, so readers only ever see a complete file.
    // Callers must hold `lock`.
    async fn write_items(&self, items: &[TrackedItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(items)?;
        let temp_path = self.temp_path();

        let mut temp_file = fs::File::create(&temp_path).await?;
        temp_file.write_all(json.as_bytes()).await?;
        temp_file.sync_all().await?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn load(&self) -> Result<Vec<TrackedItem>> {
        let _guard = self.lock.lock().await;
        let items = self.read_items().await?;
        tracing::debug!("Loaded {} products from {:?}", items.len(), self.path);
        Ok(items)
    }

    async fn save(&self, items: &[TrackedItem]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_items(items).await?;
        tracing::debug!("Saved {} products to {:?}", items.len(), self.path);
        Ok(())
    }

    async fn update(&self, mutate: Mutation<'_>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.read_items().await?;
        if mutate(&mut items) {
            self.write_items(&items).await?;
            tracing::debug!("Saved {} products to {:?}", items.len(), self.path);
        }
        Ok(())
    }
}
