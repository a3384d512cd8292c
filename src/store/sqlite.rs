use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, ErrorCode, Row};
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{timestamp, TrackedItem, UserId, PLACEHOLDER_TITLE};

use super::schema::SCHEMA;
use super::{Mutation, Store};

const SELECT_ALL: &str = "SELECT chat_id, product_link, title, initial_price, last_price, added_date, last_checked
     FROM tracked_items ORDER BY id";

pub struct SqliteStore {
    conn: Connection,
    lock: Mutex<()>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path`. A file that is not a
    /// readable SQLite database is moved aside and replaced with an empty one.
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        match Self::open_file(db_path).await {
            Err(e) if is_corrupt(&e) => {
                let aside = corrupt_path(db_path);
                tracing::warn!(
                    "Database {:?} is unreadable ({}); moving it to {:?} and starting empty",
                    db_path,
                    e,
                    aside
                );
                tokio::fs::rename(db_path, &aside).await?;
                Self::open_file(db_path).await
            }
            result => result,
        }
    }

    async fn open_file(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::with_connection(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            lock: Mutex::new(()),
        })
    }

    async fn read_items(&self) -> Result<Vec<TrackedItem>> {
        let items = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(SELECT_ALL)?;
                let items = stmt
                    .query_map([], item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    async fn write_items(&self, items: Vec<TrackedItem>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM tracked_items", [])?;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT INTO tracked_items
                               (chat_id, product_link, title, initial_price, last_price, added_date, last_checked)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    )?;
                    for item in &items {
                        stmt.execute(params![
                            item.user_id.as_str(),
                            item.product_url,
                            item.title,
                            item.initial_price,
                            item.last_price,
                            timestamp::format(&item.added_at),
                            item.last_checked_at.as_ref().map(timestamp::format),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load(&self) -> Result<Vec<TrackedItem>> {
        let _guard = self.lock.lock().await;
        self.read_items().await
    }

    async fn save(&self, items: &[TrackedItem]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_items(items.to_vec()).await
    }

    async fn update(&self, mutate: Mutation<'_>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.read_items().await?;
        if mutate(&mut items) {
            self.write_items(items).await?;
        }
        Ok(())
    }
}

fn item_from_row(row: &Row) -> rusqlite::Result<TrackedItem> {
    let added_at = row.get::<_, String>(5)?;
    let last_checked_at = row.get::<_, Option<String>>(6)?;

    Ok(TrackedItem {
        user_id: UserId::new(row.get::<_, String>(0)?),
        product_url: row.get(1)?,
        title: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string()),
        initial_price: row.get(3)?,
        last_price: row.get(4)?,
        added_at: parse_timestamp(5, &added_at)?,
        last_checked_at: last_checked_at
            .map(|s| parse_timestamp(6, &s))
            .transpose()?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    timestamp::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            format!("invalid timestamp {value:?}").into(),
        )
    })
}

fn is_corrupt(error: &AppError) -> bool {
    match error {
        AppError::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
            failure,
            _,
        ))) => matches!(
            failure.code,
            ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
        ),
        _ => false,
    }
}

fn corrupt_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}
