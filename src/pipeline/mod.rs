//! Monitoring pipeline.
//!
//! - `reconcile`: insert / status update / roll detection against the history
//! - `summarize`: staleness summary over today's flights
//! - `guard`: empty-snapshot handling for roll detection
//! - `cycle`: one-shot and periodic scrape cycles
//! - `inject`: synthetic stale flights for alert testing

pub mod cycle;
pub mod guard;
pub mod inject;
pub mod reconcile;
pub mod summarize;

pub use cycle::{CycleOutcome, run_cycle, run_scrape, run_watch};
pub use guard::{EmptySnapshotGuard, GuardConfig, GuardResult};
pub use inject::{inject_stale, synthetic_flight_number};
pub use reconcile::{ReconcileReport, Reconciler};
pub use summarize::{Summarizer, summarize_flights};
