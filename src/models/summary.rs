//! Staleness summary produced for each category.

use serde::{Deserialize, Serialize};

use crate::models::{Category, DayBucket};

/// A flight whose displayed status has gone stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedFlight {
    pub flight_number: String,
    pub minutes_since_update: i64,
    pub status: String,
}

/// Counts and alerts for one category and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub category: Category,
    pub day: DayBucket,
    /// Every flight seen today
    pub total: usize,
    /// Flights in a scheduled status that have not rolled off
    pub scheduled: usize,
    /// Flights in a terminal status (landed / departed)
    pub completed: usize,
    pub cancelled: usize,
    /// Open flights whose status has not changed for longer than the threshold
    pub flagged: Vec<FlaggedFlight>,
}

impl Summary {
    /// Zero-valued summary for a day with no data.
    pub fn empty(category: Category, day: DayBucket) -> Self {
        Self {
            category,
            day,
            total: 0,
            scheduled: 0,
            completed: 0,
            cancelled: 0,
            flagged: Vec::new(),
        }
    }

    pub fn has_alerts(&self) -> bool {
        !self.flagged.is_empty()
    }

    /// Label/count rows for tabular views.
    pub fn count_rows(&self) -> Vec<(String, usize)> {
        let terminal = match self.category {
            Category::Arrivals => "Landed",
            Category::Departures => "Departed",
        };
        vec![
            (terminal.to_string(), self.completed),
            ("Scheduled".to_string(), self.scheduled),
            ("Cancelled".to_string(), self.cancelled),
        ]
    }
}
