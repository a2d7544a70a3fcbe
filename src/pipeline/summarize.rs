// src/pipeline/summarize.rs

//! Staleness summary over today's flights.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{CategoryProfile, DayBucket, FlaggedFlight, FlightEntry, Summary};
use crate::storage::HistoryStore;
use crate::utils::time::Clock;

/// Read-only summarizer for one category.
#[derive(Clone)]
pub struct Summarizer {
    profile: CategoryProfile,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
}

impl Summarizer {
    pub fn new(
        profile: CategoryProfile,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profile,
            store,
            clock,
        }
    }

    pub fn profile(&self) -> &CategoryProfile {
        &self.profile
    }

    /// Today's flights in flight-number order.
    pub async fn flights_today(&self) -> Result<Vec<FlightEntry>> {
        self.store
            .scan_day(self.profile.category, self.clock.today())
            .await
    }

    /// Summarize today's flights. Has no side effects.
    pub async fn summarize(&self) -> Result<Summary> {
        let day = self.clock.today();
        let flights = self.store.scan_day(self.profile.category, day).await?;
        if flights.is_empty() {
            log::warn!("{}: no data found for day {}", self.profile.category, day);
        }
        Ok(summarize_flights(&self.profile, day, &flights, self.clock.now()))
    }
}

/// Count and flag a day's flights as of `now`.
///
/// A flight is flagged when it has not rolled off, its status is monitored,
/// and its status is strictly older than `warn_after_mins` whole minutes.
pub fn summarize_flights(
    profile: &CategoryProfile,
    day: DayBucket,
    flights: &[FlightEntry],
    now: i64,
) -> Summary {
    let mut summary = Summary::empty(profile.category, day);

    for flight in flights {
        summary.total += 1;
        if profile.is_terminal(&flight.status) {
            summary.completed += 1;
        }
        if profile.is_cancelled(&flight.status) {
            summary.cancelled += 1;
        }
        if flight.is_rolled() {
            continue;
        }
        if profile.is_scheduled(&flight.status) {
            summary.scheduled += 1;
        }

        let Some(age) = flight.minutes_since_status(now) else {
            continue;
        };
        log::debug!(
            "{}: {} '{}' unchanged for {} min (warn after {})",
            profile.category,
            flight.flight_number,
            flight.status,
            age,
            profile.warn_after_mins
        );
        if age > profile.warn_after_mins && profile.is_monitored(&flight.status) {
            log::info!(
                "{}: flagged {} ({} min, status '{}')",
                profile.category,
                flight.flight_number,
                age,
                flight.status
            );
            summary.flagged.push(FlaggedFlight {
                flight_number: flight.flight_number.clone(),
                minutes_since_update: age,
                status: flight.status.clone(),
            });
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, FlightKey, FlightRecord};
    use crate::pipeline::Reconciler;
    use crate::storage::{Mutation, SqliteStorage};
    use crate::utils::time::ManualClock;
    use chrono::{Local, TimeZone};

    fn profile(warn_after: i64, monitored: &[&str]) -> CategoryProfile {
        let mut p = CategoryProfile::defaults(Category::Arrivals);
        p.warn_after_mins = warn_after;
        p.monitored_statuses = monitored.iter().map(|s| s.to_string()).collect();
        p
    }

    fn flight(day: DayBucket, id: &str, status: &str, at: Option<i64>, rolled: Option<i64>) -> FlightEntry {
        let mut f = FlightEntry::from_record(&FlightRecord::new(id, status), day);
        f.status_changed_at = at;
        f.rolled_at = rolled;
        f
    }

    #[test]
    fn test_no_flights_yields_zero_summary() {
        let day = DayBucket::from_timestamp(0);
        let summary = summarize_flights(&profile(20, &["Delayed"]), day, &[], 1_000);
        assert_eq!(summary, Summary::empty(Category::Arrivals, day));
    }

    #[test]
    fn test_threshold_is_strict() {
        let now = 100_000;
        let day = DayBucket::from_timestamp(now);
        let p = profile(60, &["Delayed"]);

        let at_threshold = [flight(day, "A", "Delayed", Some(now - 60 * 60), None)];
        assert!(summarize_flights(&p, day, &at_threshold, now).flagged.is_empty());

        let past_threshold = [flight(day, "A", "Delayed", Some(now - 61 * 60), None)];
        let flagged = summarize_flights(&p, day, &past_threshold, now).flagged;
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].minutes_since_update, 61);
    }

    #[test]
    fn test_counts() {
        let now = 100_000;
        let day = DayBucket::from_timestamp(now);
        let flights = [
            flight(day, "A", "", None, None),
            flight(day, "B", "Delayed", Some(now), None),
            flight(day, "C", "Open", Some(now), Some(now)),
            flight(day, "D", "Landed", Some(now), None),
            flight(day, "E", "Early", Some(now), Some(now)),
            flight(day, "F", "Cancelled", Some(now), None),
        ];

        let summary = summarize_flights(&profile(20, &[]), day, &flights, now);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.scheduled, 2);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.cancelled, 1);
        assert!(summary.flagged.is_empty());
    }

    #[test]
    fn test_day_150_scenario() {
        let now = Local
            .with_ymd_and_hms(2024, 5, 29, 12, 0, 0)
            .single()
            .unwrap()
            .timestamp();
        let day = DayBucket::from_timestamp(now);
        assert_eq!(day.ordinal(), "150");

        let ninety_ago = Some(now - 90 * 60);
        let flights = [
            flight(day, "X", "Delayed", ninety_ago, None),
            flight(day, "Y", "Landed", ninety_ago, None),
            flight(day, "Z", "Delayed", ninety_ago, Some(now - 5 * 60)),
        ];

        let summary = summarize_flights(&profile(60, &["Delayed"]), day, &flights, now);
        assert_eq!(
            summary.flagged,
            vec![FlaggedFlight {
                flight_number: "X".into(),
                minutes_since_update: 90,
                status: "Delayed".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_summarize_reads_only_today_and_is_repeatable() {
        let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(1_716_962_400));
        let p = profile(20, &["Delayed"]);
        let mut engine = Reconciler::new(p.clone(), store.clone(), clock.clone());
        let summarizer = Summarizer::new(p, store.clone(), clock.clone());

        let yesterday = DayBucket::from_timestamp(clock.now() - 24 * 3600);
        store
            .commit(
                Category::Arrivals,
                vec![Mutation::Insert(flight(yesterday, "OLD", "Delayed", Some(0), None))],
            )
            .await
            .unwrap();

        engine
            .reconcile(&[FlightRecord::new("QF1", "Delayed"), FlightRecord::new("QF2", "")])
            .await
            .unwrap();
        clock.advance_mins(45);

        let first = summarizer.summarize().await.unwrap();
        let second = summarizer.summarize().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total, 2);
        assert_eq!(first.flagged.len(), 1);
        assert_eq!(first.flagged[0].flight_number, "QF1");
        assert_eq!(first.flagged[0].minutes_since_update, 45);

        let key = FlightKey::new("QF1", clock.today());
        let stored = store.get(Category::Arrivals, &key).await.unwrap().unwrap();
        assert_eq!(stored.rolled_at, None);
    }
}
