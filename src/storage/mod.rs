//! Storage abstractions for flight history.
//!
//! The history is append-mostly: rows are inserted on first sighting, then
//! only their status, status timestamp and roll-off timestamp change. Nothing
//! is ever deleted.
//!
//! ## Layout
//!
//! ```text
//! sqlite:  {db_file}
//!          ├── arrivals    (flight_number, day_appear) PK
//!          ├── departures  (flight_number, day_appear) PK
//!          └── guard_state (category) PK
//!
//! json:    {history_dir}/
//!          ├── arrivals.json
//!          └── departures.json
//! ```
//!
//! Every [`HistoryStore::commit`] applies its whole batch atomically, so a
//! reconciliation pass is either fully visible or not at all.

pub mod local;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Category, Config, DayBucket, FlightEntry, FlightKey, StoreKind};

// Re-export for convenience
pub use local::LocalStorage;
pub use sqlite::SqliteStorage;

/// A single write against the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a new flight; ignored when the key already exists.
    Insert(FlightEntry),
    /// Replace the status and stamp the change time.
    SetStatus {
        key: FlightKey,
        status: String,
        at: i64,
    },
    /// Stamp the roll-off time; ignored when already rolled.
    MarkRolled { key: FlightKey, at: i64 },
}

/// Trait for flight history backends.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Point lookup of one flight.
    async fn get(&self, category: Category, key: &FlightKey) -> Result<Option<FlightEntry>>;

    /// Whether a flight exists for the key.
    async fn exists(&self, category: Category, key: &FlightKey) -> Result<bool> {
        Ok(self.get(category, key).await?.is_some())
    }

    /// All flights first seen on `day`, ordered by flight number.
    async fn scan_day(&self, category: Category, day: DayBucket) -> Result<Vec<FlightEntry>>;

    /// Every stored flight, ordered by day then flight number.
    async fn scan_all(&self, category: Category) -> Result<Vec<FlightEntry>>;

    /// Apply a batch atomically. Returns how many mutations changed a row.
    async fn commit(&self, category: Category, batch: Vec<Mutation>) -> Result<usize>;

    /// Consecutive empty snapshots recorded for the category; 0 when unset.
    async fn empty_streak(&self, category: Category) -> Result<u32>;

    /// Persist the consecutive empty snapshot count.
    async fn set_empty_streak(&self, category: Category, streak: u32) -> Result<()>;
}

/// Open the backend selected in the configuration.
pub fn open_store(config: &Config) -> Result<Arc<dyn HistoryStore>> {
    match config.monitor.store {
        StoreKind::Sqlite => {
            let store = SqliteStorage::open(&config.monitor.db_file)?;
            log::info!("History store: sqlite at {}", config.monitor.db_file.display());
            Ok(Arc::new(store))
        }
        StoreKind::Json => {
            let store = LocalStorage::new(&config.monitor.history_dir);
            log::info!(
                "History store: json files under {}",
                config.monitor.history_dir.display()
            );
            Ok(Arc::new(store))
        }
    }
}
