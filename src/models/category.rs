//! Flight board categories.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A flight board monitored by the application.
///
/// Each category owns an independent history namespace; nothing written for
/// one category is ever visible to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Arrivals,
    Departures,
}

impl Category {
    /// All categories in scrape order (departures first).
    pub const ALL: [Category; 2] = [Category::Departures, Category::Arrivals];

    /// Stable lowercase name, also the storage namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Arrivals => "arrivals",
            Category::Departures => "departures",
        }
    }

    /// Key used for the terminal-status count in JSON summaries.
    pub fn terminal_label(&self) -> &'static str {
        match self {
            Category::Arrivals => "landed",
            Category::Departures => "departed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arrivals" | "arrival" | "arr" => Ok(Category::Arrivals),
            "departures" | "departure" | "dep" => Ok(Category::Departures),
            other => Err(AppError::validation(format!("unknown category '{other}'"))),
        }
    }
}
