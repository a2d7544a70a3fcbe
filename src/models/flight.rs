//! Flight rows as scraped and as stored.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A raw row read from the flight board.
///
/// Every field except `flight_number` may legitimately be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub flight_number: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub departure_time: String,
    #[serde(default)]
    pub arrival_time: String,
    #[serde(default)]
    pub gate: String,
    #[serde(default)]
    pub status: String,
}

impl FlightRecord {
    /// Shorthand for a record carrying only an identifier and a status.
    pub fn new(flight_number: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            flight_number: flight_number.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    /// The trimmed identifier, or `None` for a malformed row.
    pub fn identifier(&self) -> Option<&str> {
        let id = self.flight_number.trim();
        (!id.is_empty()).then_some(id)
    }
}

/// Partition key grouping flights by the local calendar day they were first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayBucket(NaiveDate);

impl DayBucket {
    const KEY_FORMAT: &'static str = "%Y-%m-%d";

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Day bucket of a Unix timestamp in the local time zone.
    pub fn from_timestamp(ts: i64) -> Self {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|utc| utc.with_timezone(&Local).date_naive())
            .unwrap_or_else(|| Local::now().date_naive());
        Self(date)
    }

    /// Parse a stored `YYYY-MM-DD` key.
    pub fn parse(key: &str) -> Result<Self> {
        NaiveDate::parse_from_str(key, Self::KEY_FORMAT)
            .map(Self)
            .map_err(|e| AppError::store(format!("invalid day bucket '{key}': {e}")))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Storage key (`YYYY-MM-DD`).
    pub fn key(&self) -> String {
        self.0.format(Self::KEY_FORMAT).to_string()
    }

    /// Zero-padded day of year (`"001"`..`"366"`).
    pub fn ordinal(&self) -> String {
        self.0.format("%j").to_string()
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::KEY_FORMAT))
    }
}

/// Primary key of a stored flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightKey {
    pub flight_number: String,
    pub day: DayBucket,
}

impl FlightKey {
    pub fn new(flight_number: impl Into<String>, day: DayBucket) -> Self {
        Self {
            flight_number: flight_number.into(),
            day,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.flight_number, self.day)
    }
}

/// A flight as held in the history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightEntry {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub gate: String,
    pub status: String,
    pub day: DayBucket,
    /// Unix seconds of the last observed status change
    pub status_changed_at: Option<i64>,
    /// Unix seconds at which the flight left the board
    pub rolled_at: Option<i64>,
}

impl FlightEntry {
    /// Build a fresh entry from a scraped row.
    ///
    /// Timestamps start unset; the status is stored as seen.
    pub fn from_record(record: &FlightRecord, day: DayBucket) -> Self {
        Self {
            flight_number: record.flight_number.trim().to_string(),
            origin: record.origin.clone(),
            destination: record.destination.clone(),
            departure_time: record.departure_time.clone(),
            arrival_time: record.arrival_time.clone(),
            gate: record.gate.clone(),
            status: record.status.clone(),
            day,
            status_changed_at: None,
            rolled_at: None,
        }
    }

    pub fn key(&self) -> FlightKey {
        FlightKey::new(self.flight_number.clone(), self.day)
    }

    pub fn is_rolled(&self) -> bool {
        self.rolled_at.is_some()
    }

    /// Whole minutes since the last status change, truncated toward zero.
    pub fn minutes_since_status(&self, now: i64) -> Option<i64> {
        self.status_changed_at.map(|ts| (now - ts) / 60)
    }

    /// Minutes the status was displayed: until roll-off if rolled, otherwise until `now`.
    pub fn display_minutes(&self, now: i64) -> Option<i64> {
        let since = self.status_changed_at?;
        let until = self.rolled_at.unwrap_or(now);
        Some((until - since) / 60)
    }
}
