// src/lib.rs

//! Flight display roll-off monitor.
//!
//! Scrapes an airport's arrivals and departures boards, keeps a per-day
//! history of every flight seen, and flags flights whose status stopped
//! changing without the flight leaving the display.

pub mod context;
pub mod error;
pub mod models;
pub mod pipeline;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
pub mod views;
