// src/utils/time.rs

//! Wall-clock access and timestamp formatting.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Local, Utc};

use crate::models::DayBucket;

/// Source of "now" for the engine and summarizer.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> i64;

    /// Day bucket for the current moment.
    fn today(&self) -> DayBucket {
        DayBucket::from_timestamp(self.now())
    }
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn advance_mins(&self, mins: i64) {
        self.advance_secs(mins * 60);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn local(ts: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp(ts, 0).map(|utc| utc.with_timezone(&Local))
}

/// Local `HH:MM:SS` for a Unix timestamp.
pub fn format_hms(ts: i64) -> String {
    local(ts)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Local `YYYY-MM-DD HH:MM:SS` for a Unix timestamp.
pub fn format_datetime(ts: i64) -> String {
    local(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
