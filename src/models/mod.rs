// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod category;
mod config;
mod flight;
mod summary;

// Re-export all public types
pub use category::Category;
pub use config::{
    CategoryConfig, CategoryProfile, Config, CrawlerConfig, FetchMode, FieldSelector,
    MonitorConfig, SelectorsConfig, StoreKind,
};
pub use flight::{DayBucket, FlightEntry, FlightKey, FlightRecord};
pub use summary::{FlaggedFlight, Summary};
