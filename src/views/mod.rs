//! Renderings of a day's history and its summary.
//!
//! - `table`: grid text for terminals
//! - `csv`: raw stored columns, one file per category and day
//! - `html`: summary and history tables, plus the status widget
//! - `json`: the machine-readable summary served at `/json`

pub mod csv;
pub mod html;
pub mod json;
pub mod table;

use crate::models::FlightEntry;
use crate::utils::time::format_hms;

/// Stored column names, in table order.
pub const COLUMNS: [&str; 10] = [
    "flight_number",
    "origin",
    "destination",
    "departure_time",
    "arrival_time",
    "gate",
    "status",
    "day_appear",
    "date_status",
    "date_rolled",
];

/// Extra column appended by the human-readable views.
pub const DELTA_COLUMN: &str = "Time Delta (min)";

fn optional(value: Option<i64>, render: impl Fn(i64) -> String) -> String {
    value.map(render).unwrap_or_default()
}

/// Stored values as-is, timestamps in Unix seconds.
pub fn raw_row(flight: &FlightEntry) -> Vec<String> {
    vec![
        flight.flight_number.clone(),
        flight.origin.clone(),
        flight.destination.clone(),
        flight.departure_time.clone(),
        flight.arrival_time.clone(),
        flight.gate.clone(),
        flight.status.clone(),
        flight.day.key(),
        optional(flight.status_changed_at, |ts| ts.to_string()),
        optional(flight.rolled_at, |ts| ts.to_string()),
    ]
}

pub fn display_headers() -> Vec<String> {
    COLUMNS
        .iter()
        .chain(std::iter::once(&DELTA_COLUMN))
        .map(|c| c.to_string())
        .collect()
}

/// Row with local `HH:MM:SS` timestamps and the minutes the status was shown.
pub fn display_row(flight: &FlightEntry, now: i64) -> Vec<String> {
    let mut row = raw_row(flight);
    row[8] = optional(flight.status_changed_at, format_hms);
    row[9] = optional(flight.rolled_at, format_hms);
    row.push(optional(flight.display_minutes(now), |m| m.to_string()));
    row
}
