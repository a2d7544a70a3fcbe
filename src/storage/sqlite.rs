//! SQLite history backend.
//!
//! One table per category. Table names are fixed at compile time: every
//! statement for a category is a `concat!` of literals, so no runtime string
//! ever reaches the SQL text.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{AppError, Result};
use crate::models::{Category, DayBucket, FlightEntry, FlightKey};
use crate::storage::{HistoryStore, Mutation};

/// Prepared SQL text for one category table.
struct Statements {
    create: &'static str,
    insert: &'static str,
    select_one: &'static str,
    select_day: &'static str,
    select_all: &'static str,
    set_status: &'static str,
    mark_rolled: &'static str,
}

macro_rules! columns {
    () => {
        "flight_number, origin, destination, departure_time, arrival_time, gate, status, \
         day_appear, date_status, date_rolled"
    };
}

macro_rules! statements {
    ($table:literal) => {
        Statements {
            create: concat!(
                "CREATE TABLE IF NOT EXISTS ",
                $table,
                " (
                    flight_number TEXT NOT NULL,
                    origin TEXT NOT NULL,
                    destination TEXT NOT NULL,
                    departure_time TEXT,
                    arrival_time TEXT,
                    gate TEXT,
                    status TEXT,
                    day_appear TEXT NOT NULL,
                    date_status INTEGER,
                    date_rolled INTEGER,
                    PRIMARY KEY (flight_number, day_appear)
                )"
            ),
            insert: concat!(
                "INSERT OR IGNORE INTO ",
                $table,
                " (",
                columns!(),
                ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            select_one: concat!(
                "SELECT ",
                columns!(),
                " FROM ",
                $table,
                " WHERE flight_number = ?1 AND day_appear = ?2"
            ),
            select_day: concat!(
                "SELECT ",
                columns!(),
                " FROM ",
                $table,
                " WHERE day_appear = ?1 ORDER BY flight_number"
            ),
            select_all: concat!(
                "SELECT ",
                columns!(),
                " FROM ",
                $table,
                " ORDER BY day_appear, flight_number"
            ),
            set_status: concat!(
                "UPDATE ",
                $table,
                " SET status = ?1, date_status = ?2 WHERE flight_number = ?3 AND day_appear = ?4"
            ),
            mark_rolled: concat!(
                "UPDATE ",
                $table,
                " SET date_rolled = ?1 \
                 WHERE flight_number = ?2 AND day_appear = ?3 AND date_rolled IS NULL"
            ),
        }
    };
}

const CREATE_GUARD_STATE: &str = "CREATE TABLE IF NOT EXISTS guard_state (
    category TEXT PRIMARY KEY,
    consecutive_empty INTEGER NOT NULL
)";
const SELECT_STREAK: &str = "SELECT consecutive_empty FROM guard_state WHERE category = ?1";
const UPSERT_STREAK: &str = "INSERT INTO guard_state (category, consecutive_empty) VALUES (?1, ?2) \
     ON CONFLICT(category) DO UPDATE SET consecutive_empty = excluded.consecutive_empty";

const ARRIVALS: Statements = statements!("arrivals");
const DEPARTURES: Statements = statements!("departures");

fn statements(category: Category) -> &'static Statements {
    match category {
        Category::Arrivals => &ARRIVALS,
        Category::Departures => &DEPARTURES,
    }
}

/// A row as read from SQLite, before the day key is validated.
struct RawRow {
    entry: FlightEntry,
    day_key: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    let day_key: String = row.get(7)?;
    Ok(RawRow {
        entry: FlightEntry {
            flight_number: text(0)?,
            origin: text(1)?,
            destination: text(2)?,
            departure_time: text(3)?,
            arrival_time: text(4)?,
            gate: text(5)?,
            status: text(6)?,
            // placeholder until the key is parsed
            day: DayBucket::from_timestamp(0),
            status_changed_at: row.get(8)?,
            rolled_at: row.get(9)?,
        },
        day_key,
    })
}

fn finish(raw: RawRow) -> Result<FlightEntry> {
    let mut entry = raw.entry;
    entry.day = DayBucket::parse(&raw.day_key)?;
    Ok(entry)
}

fn query_entries(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<FlightEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, read_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(finish).collect()
}

/// SQLite-backed history store.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::bootstrap(Connection::open(path)?)
    }

    /// In-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        for category in Category::ALL {
            conn.execute(statements(category).create, [])?;
            log::debug!("Table {} ready", category);
        }
        conn.execute(CREATE_GUARD_STATE, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::store("sqlite connection mutex poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(AppError::store)?
    }
}

#[async_trait]
impl HistoryStore for SqliteStorage {
    async fn get(&self, category: Category, key: &FlightKey) -> Result<Option<FlightEntry>> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    statements(category).select_one,
                    params![key.flight_number, key.day.key()],
                    read_row,
                )
                .optional()?;
            raw.map(finish).transpose()
        })
        .await
    }

    async fn scan_day(&self, category: Category, day: DayBucket) -> Result<Vec<FlightEntry>> {
        self.with_conn(move |conn| {
            query_entries(conn, statements(category).select_day, params![day.key()])
        })
        .await
    }

    async fn scan_all(&self, category: Category) -> Result<Vec<FlightEntry>> {
        self.with_conn(move |conn| query_entries(conn, statements(category).select_all, []))
            .await
    }

    async fn commit(&self, category: Category, batch: Vec<Mutation>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.with_conn(move |conn| {
            let sql = statements(category);
            let tx = conn.transaction()?;
            let mut changed = 0;
            for mutation in &batch {
                changed += match mutation {
                    Mutation::Insert(e) => tx.execute(
                        sql.insert,
                        params![
                            e.flight_number,
                            e.origin,
                            e.destination,
                            e.departure_time,
                            e.arrival_time,
                            e.gate,
                            e.status,
                            e.day.key(),
                            e.status_changed_at,
                            e.rolled_at,
                        ],
                    )?,
                    Mutation::SetStatus { key, status, at } => tx.execute(
                        sql.set_status,
                        params![status, at, key.flight_number, key.day.key()],
                    )?,
                    Mutation::MarkRolled { key, at } => tx.execute(
                        sql.mark_rolled,
                        params![at, key.flight_number, key.day.key()],
                    )?,
                };
            }
            tx.commit()?;
            Ok(changed)
        })
        .await
    }

    async fn empty_streak(&self, category: Category) -> Result<u32> {
        self.with_conn(move |conn| {
            let streak = conn
                .query_row(SELECT_STREAK, params![category.as_str()], |row| {
                    row.get::<_, u32>(0)
                })
                .optional()?;
            Ok(streak.unwrap_or_default())
        })
        .await
    }

    async fn set_empty_streak(&self, category: Category, streak: u32) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(UPSERT_STREAK, params![category.as_str(), streak])?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightRecord;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day(d: u32) -> DayBucket {
        DayBucket::from_date(NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    fn entry(id: &str, status: &str, d: u32) -> FlightEntry {
        let mut record = FlightRecord::new(id, status);
        record.origin = "Sydney".into();
        FlightEntry::from_record(&record, day(d))
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let batch = vec![Mutation::Insert(entry("QF1", "", 29))];

        assert_eq!(store.commit(Category::Arrivals, batch.clone()).await.unwrap(), 1);
        assert_eq!(store.commit(Category::Arrivals, batch).await.unwrap(), 0);
        assert_eq!(store.scan_day(Category::Arrivals, day(29)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_categories_are_isolated() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store
            .commit(Category::Arrivals, vec![Mutation::Insert(entry("QF1", "", 29))])
            .await
            .unwrap();

        let key = FlightKey::new("QF1", day(29));
        assert!(store.exists(Category::Arrivals, &key).await.unwrap());
        assert!(!store.exists(Category::Departures, &key).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_flight_on_another_day_is_distinct() {
        let store = SqliteStorage::open_in_memory().unwrap();
        store
            .commit(
                Category::Arrivals,
                vec![
                    Mutation::Insert(entry("QF1", "", 28)),
                    Mutation::Insert(entry("QF1", "", 29)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.scan_all(Category::Arrivals).await.unwrap().len(), 2);
        assert_eq!(store.scan_day(Category::Arrivals, day(28)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_and_roll_once() {
        let store = SqliteStorage::open_in_memory().unwrap();
        let key = FlightKey::new("VA7", day(29));
        store
            .commit(Category::Departures, vec![Mutation::Insert(entry("VA7", "", 29))])
            .await
            .unwrap();

        store
            .commit(
                Category::Departures,
                vec![
                    Mutation::SetStatus {
                        key: key.clone(),
                        status: "Boarding".into(),
                        at: 100,
                    },
                    Mutation::MarkRolled {
                        key: key.clone(),
                        at: 200,
                    },
                ],
            )
            .await
            .unwrap();
        let changed = store
            .commit(
                Category::Departures,
                vec![Mutation::MarkRolled {
                    key: key.clone(),
                    at: 300,
                }],
            )
            .await
            .unwrap();

        let stored = store.get(Category::Departures, &key).await.unwrap().unwrap();
        assert_eq!(changed, 0);
        assert_eq!(stored.status, "Boarding");
        assert_eq!(stored.status_changed_at, Some(100));
        assert_eq!(stored.rolled_at, Some(200));
        assert_eq!(stored.origin, "Sydney");
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_history() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/flightmon.db");

        {
            let store = SqliteStorage::open(&path).unwrap();
            store
                .commit(Category::Arrivals, vec![Mutation::Insert(entry("JQ9", "Landed", 29))])
                .await
                .unwrap();
        }

        let store = SqliteStorage::open(&path).unwrap();
        let all = store.scan_all(Category::Arrivals).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, "Landed");
        assert_eq!(all[0].day, day(29));
    }

    #[tokio::test]
    async fn test_empty_streak_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("flightmon.db");

        {
            let store = SqliteStorage::open(&path).unwrap();
            assert_eq!(store.empty_streak(Category::Arrivals).await.unwrap(), 0);
            store.set_empty_streak(Category::Arrivals, 1).await.unwrap();
            store.set_empty_streak(Category::Arrivals, 2).await.unwrap();
        }

        let store = SqliteStorage::open(&path).unwrap();
        assert_eq!(store.empty_streak(Category::Arrivals).await.unwrap(), 2);
        assert_eq!(store.empty_streak(Category::Departures).await.unwrap(), 0);
    }
}
