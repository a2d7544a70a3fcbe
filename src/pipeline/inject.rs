// src/pipeline/inject.rs

//! Synthetic stale flights for exercising alerting end to end.

use crate::context::MonitorContext;
use crate::error::{AppError, Result};
use crate::models::{Category, FlightEntry, FlightKey, FlightRecord};
use crate::storage::Mutation;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `X` followed by five characters derived from `seed`.
///
/// Real flight numbers never start with `X`, so injected rows are easy to
/// spot and clean up.
pub fn synthetic_flight_number(seed: u64) -> String {
    let mut id = String::from("X");
    let mut n = seed;
    for _ in 0..5 {
        id.push(ALPHABET[(n % ALPHABET.len() as u64) as usize] as char);
        n /= ALPHABET.len() as u64;
    }
    id
}

/// Insert a flight for today whose `status` changed `minutes` ago.
pub async fn inject_stale(
    ctx: &MonitorContext,
    category: Category,
    flight_number: &str,
    status: &str,
    minutes: i64,
) -> Result<FlightKey> {
    let now = ctx.clock().now();
    let mut entry = FlightEntry::from_record(
        &FlightRecord {
            origin: "TEST".into(),
            destination: "TEST".into(),
            ..FlightRecord::new(flight_number, status)
        },
        ctx.clock().today(),
    );
    entry.status_changed_at = Some(now - minutes * 60);
    let key = entry.key();

    let changed = ctx
        .store()
        .commit(category, vec![Mutation::Insert(entry)])
        .await?;
    if changed == 0 {
        return Err(AppError::store(format!("{category}: {key} already exists")));
    }
    log::info!(
        "{}: injected {} with status '{}' set {} min ago",
        category,
        key,
        status,
        minutes
    );
    Ok(key)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::Config;
    use crate::storage::SqliteStorage;
    use crate::utils::time::ManualClock;

    #[test]
    fn test_synthetic_flight_number_shape() {
        let id = synthetic_flight_number(123_456_789);
        assert_eq!(id.len(), 6);
        assert!(id.starts_with('X'));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, synthetic_flight_number(987_654_321));
    }

    #[tokio::test]
    async fn test_injected_flight_is_flagged() {
        let clock = Arc::new(ManualClock::new(1_716_962_400));
        let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let ctx = MonitorContext::new(Config::default(), store, clock);

        inject_stale(&ctx, Category::Arrivals, "XAB12C", "Landed", 120)
            .await
            .unwrap();
        let summary = ctx.summarize(Category::Arrivals).await.unwrap();

        assert_eq!(summary.flagged.len(), 1);
        assert_eq!(summary.flagged[0].flight_number, "XAB12C");
        assert_eq!(summary.flagged[0].minutes_since_update, 120);

        let again = inject_stale(&ctx, Category::Arrivals, "XAB12C", "Landed", 120).await;
        assert!(matches!(again, Err(AppError::Store(_))));
    }
}
