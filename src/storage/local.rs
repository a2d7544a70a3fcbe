//! Local filesystem history backend.
//!
//! Keeps each category's history in a single JSON document. Suited to
//! development and small deployments; production runs use [`SqliteStorage`].
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── arrivals.json
//! └── departures.json
//! ```
//!
//! A commit rewrites the whole document through a temp file and a rename, so
//! readers see either the previous pass or the new one, never a mix.
//!
//! [`SqliteStorage`]: crate::storage::SqliteStorage

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Category, DayBucket, FlightEntry, FlightKey};
use crate::storage::{HistoryStore, Mutation};

/// On-disk document for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryFile {
    /// ISO 8601 timestamp of last commit
    pub updated_at: DateTime<Utc>,
    /// Total flight count
    pub count: usize,
    /// Consecutive empty snapshots seen by the guard
    #[serde(default)]
    pub consecutive_empty: u32,
    /// Flights ordered by day then flight number
    pub flights: Vec<FlightEntry>,
}

impl HistoryFile {
    pub fn new(mut flights: Vec<FlightEntry>) -> Self {
        flights.sort_by(|a, b| {
            (a.day, a.flight_number.as_str()).cmp(&(b.day, b.flight_number.as_str()))
        });
        Self {
            updated_at: Utc::now(),
            count: flights.len(),
            consecutive_empty: 0,
            flights,
        }
    }
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn history_key(category: Category) -> String {
        format!("{}.json", category.as_str())
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load a category document; empty when nothing was written yet.
    async fn load_file(&self, category: Category) -> Result<HistoryFile> {
        let key = Self::history_key(category);
        match self.read_json::<HistoryFile>(&key).await? {
            Some(file) => Ok(file),
            None => {
                log::debug!("No {} found", key);
                Ok(HistoryFile::new(Vec::new()))
            }
        }
    }

    async fn load(&self, category: Category) -> Result<Vec<FlightEntry>> {
        Ok(self.load_file(category).await?.flights)
    }
}

fn find(flights: &[FlightEntry], key: &FlightKey) -> Option<usize> {
    flights
        .iter()
        .position(|f| f.day == key.day && f.flight_number == key.flight_number)
}

/// Apply one mutation in memory. Returns whether anything changed.
fn apply(flights: &mut Vec<FlightEntry>, mutation: Mutation) -> bool {
    match mutation {
        Mutation::Insert(entry) => {
            if find(flights, &entry.key()).is_some() {
                return false;
            }
            flights.push(entry);
            true
        }
        Mutation::SetStatus { key, status, at } => match find(flights, &key) {
            Some(idx) => {
                flights[idx].status = status;
                flights[idx].status_changed_at = Some(at);
                true
            }
            None => false,
        },
        Mutation::MarkRolled { key, at } => match find(flights, &key) {
            Some(idx) if flights[idx].rolled_at.is_none() => {
                flights[idx].rolled_at = Some(at);
                true
            }
            _ => false,
        },
    }
}

#[async_trait]
impl HistoryStore for LocalStorage {
    async fn get(&self, category: Category, key: &FlightKey) -> Result<Option<FlightEntry>> {
        Ok(self
            .load(category)
            .await?
            .into_iter()
            .find(|f| f.day == key.day && f.flight_number == key.flight_number))
    }

    async fn scan_day(&self, category: Category, day: DayBucket) -> Result<Vec<FlightEntry>> {
        let mut flights: Vec<_> = self
            .load(category)
            .await?
            .into_iter()
            .filter(|f| f.day == day)
            .collect();
        flights.sort_by(|a, b| a.flight_number.cmp(&b.flight_number));
        Ok(flights)
    }

    async fn scan_all(&self, category: Category) -> Result<Vec<FlightEntry>> {
        Ok(HistoryFile::new(self.load(category).await?).flights)
    }

    async fn commit(&self, category: Category, batch: Vec<Mutation>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;

        let loaded = self.load_file(category).await?;
        let streak = loaded.consecutive_empty;
        let mut flights = loaded.flights;
        let mut changed = 0;
        for mutation in batch {
            if apply(&mut flights, mutation) {
                changed += 1;
            }
        }

        if changed > 0 {
            let mut file = HistoryFile::new(flights);
            file.consecutive_empty = streak;
            self.write_json(&Self::history_key(category), &file).await?;
            log::debug!("{}: {} flights written", category, file.count);
        }
        Ok(changed)
    }

    async fn empty_streak(&self, category: Category) -> Result<u32> {
        Ok(self.load_file(category).await?.consecutive_empty)
    }

    async fn set_empty_streak(&self, category: Category, streak: u32) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut file = self.load_file(category).await?;
        if file.consecutive_empty == streak {
            return Ok(());
        }
        file.consecutive_empty = streak;
        file.updated_at = Utc::now();
        self.write_json(&Self::history_key(category), &file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightRecord;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day() -> DayBucket {
        DayBucket::from_date(NaiveDate::from_ymd_opt(2024, 5, 29).unwrap())
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
        assert!(storage.scan_all(Category::Arrivals).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let entry = FlightEntry::from_record(&FlightRecord::new("QF680", "Open"), day());
        let key = entry.key();

        let changed = storage
            .commit(
                Category::Departures,
                vec![
                    Mutation::Insert(entry.clone()),
                    Mutation::Insert(entry),
                    Mutation::SetStatus {
                        key: key.clone(),
                        status: "Final Call".into(),
                        at: 50,
                    },
                ],
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let loaded: HistoryFile = storage
            .read_json("departures.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.count, 1);
        assert_eq!(loaded.flights[0].status, "Final Call");
        assert!(!tmp.path().join("departures.tmp").exists());

        let other = storage.get(Category::Arrivals, &key).await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_mark_rolled_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let entry = FlightEntry::from_record(&FlightRecord::new("JQ1", ""), day());
        let key = entry.key();

        storage
            .commit(
                Category::Arrivals,
                vec![
                    Mutation::Insert(entry),
                    Mutation::MarkRolled {
                        key: key.clone(),
                        at: 10,
                    },
                ],
            )
            .await
            .unwrap();
        let changed = storage
            .commit(
                Category::Arrivals,
                vec![Mutation::MarkRolled {
                    key: key.clone(),
                    at: 99,
                }],
            )
            .await
            .unwrap();

        assert_eq!(changed, 0);
        let stored = storage.get(Category::Arrivals, &key).await.unwrap().unwrap();
        assert_eq!(stored.rolled_at, Some(10));
    }

    #[tokio::test]
    async fn test_empty_streak_kept_across_commits() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert_eq!(storage.empty_streak(Category::Arrivals).await.unwrap(), 0);

        storage.set_empty_streak(Category::Arrivals, 2).await.unwrap();
        let entry = FlightEntry::from_record(&FlightRecord::new("QF1", ""), day());
        storage
            .commit(Category::Arrivals, vec![Mutation::Insert(entry)])
            .await
            .unwrap();

        let reopened = LocalStorage::new(tmp.path());
        assert_eq!(reopened.empty_streak(Category::Arrivals).await.unwrap(), 2);
        assert_eq!(reopened.scan_all(Category::Arrivals).await.unwrap().len(), 1);
        assert_eq!(reopened.empty_streak(Category::Departures).await.unwrap(), 0);
    }
}
