// src/pipeline/reconcile.rs

//! Reconciliation of a fresh snapshot against the flight history.
//!
//! Three passes run in a fixed order, each committed before the next starts:
//!
//! 1. **Insert**: flights not yet recorded today are inserted. A flight that
//!    arrives with a status already set gets its status timestamp now.
//! 2. **Status update**: flights whose displayed status differs from the
//!    stored one get the new status and a fresh timestamp.
//! 3. **Roll detection**: flights recorded today but missing from the
//!    snapshot are stamped as rolled, once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Category, CategoryProfile, DayBucket, FlightEntry, FlightKey, FlightRecord};
use crate::pipeline::guard::EmptySnapshotGuard;
use crate::storage::{HistoryStore, Mutation};
use crate::utils::time::Clock;

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub snapshot_size: usize,
    /// Rows skipped for lacking a flight number
    pub malformed: usize,
    pub inserted: Vec<String>,
    pub status_changed: Vec<String>,
    pub rolled: Vec<String>,
    /// Roll detection was skipped by the empty-snapshot guard
    pub roll_suppressed: bool,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        !self.inserted.is_empty() || !self.status_changed.is_empty() || !self.rolled.is_empty()
    }
}

/// Reconciliation engine for one category.
///
/// Reads and writes the guard's streak around each snapshot, so callers
/// serialise access (one cycle at a time per category).
pub struct Reconciler {
    profile: CategoryProfile,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    guard: EmptySnapshotGuard,
}

impl Reconciler {
    pub fn new(
        profile: CategoryProfile,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = EmptySnapshotGuard::new(profile.empty_snapshot_grace);
        Self {
            profile,
            store,
            clock,
            guard,
        }
    }

    pub fn category(&self) -> Category {
        self.profile.category
    }

    pub fn profile(&self) -> &CategoryProfile {
        &self.profile
    }

    /// Run all three passes for one snapshot.
    pub async fn reconcile(&mut self, snapshot: &[FlightRecord]) -> Result<ReconcileReport> {
        let day = self.clock.today();
        log::info!(
            "{}: reconciling {} rows against day {} ({})",
            self.category(),
            snapshot.len(),
            day,
            day.ordinal()
        );

        let mut report = ReconcileReport {
            snapshot_size: snapshot.len(),
            ..ReconcileReport::default()
        };

        let (inserted, malformed) = self.insert_new(day, snapshot).await?;
        report.inserted = inserted;
        report.malformed = malformed;

        report.status_changed = self.update_statuses(day, snapshot).await?;

        if self.admit_roll(snapshot.len() - malformed).await? {
            report.rolled = self.flag_rolled(day, snapshot).await?;
        } else {
            report.roll_suppressed = true;
        }

        log::info!(
            "{}: {} inserted, {} status changes, {} rolled{}",
            self.category(),
            report.inserted.len(),
            report.status_changed.len(),
            report.rolled.len(),
            if report.roll_suppressed {
                " (roll detection suppressed)"
            } else {
                ""
            }
        );
        Ok(report)
    }

    /// Run the empty-snapshot guard against the stored streak.
    ///
    /// Rows without a flight number do not count: a board whose rows render
    /// but whose identifiers do not is as blind as an empty one.
    async fn admit_roll(&mut self, identified: usize) -> Result<bool> {
        let category = self.category();
        let previous = self.store.empty_streak(category).await?;
        self.guard.resume(previous);
        let admitted = self.guard.admit(identified);
        let streak = self.guard.consecutive_empty();
        if streak != previous {
            self.store.set_empty_streak(category, streak).await?;
        }
        Ok(admitted)
    }

    /// Pass 1: insert flights not yet seen on `day`.
    ///
    /// Returns the inserted flight numbers and the number of malformed rows.
    pub async fn insert_new(
        &self,
        day: DayBucket,
        snapshot: &[FlightRecord],
    ) -> Result<(Vec<String>, usize)> {
        let category = self.category();
        let now = self.clock.now();
        let mut batch = Vec::new();
        let mut inserted = Vec::new();
        let mut queued = HashSet::new();
        let mut malformed = 0;

        for record in snapshot {
            let Some(id) = record.identifier() else {
                malformed += 1;
                log::info!("{}: row without flight number skipped: {:?}", category, record);
                continue;
            };
            if queued.contains(id) {
                continue;
            }

            let key = FlightKey::new(id, day);
            if self.store.exists(category, &key).await? {
                log::debug!("{}: {} already recorded", category, key);
                continue;
            }

            let mut entry = FlightEntry::from_record(record, day);
            if !entry.status.is_empty() {
                entry.status_changed_at = Some(now);
                log::info!(
                    "{}: new flight {} already showing '{}'",
                    category,
                    key,
                    entry.status
                );
            } else {
                log::info!("{}: new flight {}", category, key);
            }

            queued.insert(id.to_string());
            inserted.push(id.to_string());
            batch.push(Mutation::Insert(entry));
        }

        self.store.commit(category, batch).await?;
        Ok((inserted, malformed))
    }

    /// Pass 2: stamp every status that differs from the stored one.
    pub async fn update_statuses(
        &self,
        day: DayBucket,
        snapshot: &[FlightRecord],
    ) -> Result<Vec<String>> {
        let category = self.category();
        let now = self.clock.now();
        let mut current: HashMap<String, String> = self
            .store
            .scan_day(category, day)
            .await?
            .into_iter()
            .map(|f| (f.flight_number, f.status))
            .collect();

        let mut batch = Vec::new();
        let mut changed = Vec::new();

        for record in snapshot {
            let Some(id) = record.identifier() else {
                continue;
            };
            let Some(stored) = current.get_mut(id) else {
                log::info!("{}: no stored flight {} [{}] to update", category, id, day);
                continue;
            };
            if *stored == record.status {
                log::debug!("{}: {} unchanged ('{}')", category, id, stored);
                continue;
            }

            log::info!(
                "{}: {} [{}] status '{}' -> '{}'",
                category,
                id,
                day,
                stored,
                record.status
            );
            batch.push(Mutation::SetStatus {
                key: FlightKey::new(id, day),
                status: record.status.clone(),
                at: now,
            });
            *stored = record.status.clone();
            if !changed.iter().any(|c| c == id) {
                changed.push(id.to_string());
            }
        }

        self.store.commit(category, batch).await?;
        Ok(changed)
    }

    /// Pass 3: mark flights recorded on `day` but absent from the snapshot.
    pub async fn flag_rolled(&self, day: DayBucket, snapshot: &[FlightRecord]) -> Result<Vec<String>> {
        let category = self.category();
        let now = self.clock.now();
        let present: HashSet<&str> = snapshot.iter().filter_map(FlightRecord::identifier).collect();

        let mut batch = Vec::new();
        let mut rolled = Vec::new();
        for flight in self.store.scan_day(category, day).await? {
            if flight.is_rolled() || present.contains(flight.flight_number.as_str()) {
                continue;
            }
            log::info!("{}: {} [{}] marked as rolled", category, flight.flight_number, day);
            batch.push(Mutation::MarkRolled {
                key: flight.key(),
                at: now,
            });
            rolled.push(flight.flight_number);
        }

        self.store.commit(category, batch).await?;
        Ok(rolled)
    }
}
