// src/pipeline/cycle.rs

//! Scrape cycles: fetch, reconcile, summarize.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;

use crate::context::MonitorContext;
use crate::error::Result;
use crate::models::{Category, Summary};
use crate::pipeline::ReconcileReport;
use crate::services::SnapshotProducer;
use crate::views::json;

/// Result of one category's cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub category: Category,
    /// The producer failed and the board was treated as empty
    pub fetch_failed: bool,
    pub report: ReconcileReport,
    pub summary: Summary,
}

/// Run one cycle for a category.
///
/// A failed fetch is logged and reconciled as an empty snapshot. Store
/// errors abort the cycle.
pub async fn run_cycle(
    ctx: &MonitorContext,
    producer: &dyn SnapshotProducer,
    category: Category,
) -> Result<CycleOutcome> {
    log::info!("Starting scrape of {}", category);
    let (snapshot, fetch_failed) = match producer.fetch(ctx.profile(category)).await {
        Ok(rows) => (rows, false),
        Err(e) => {
            log::error!("{}: snapshot fetch failed, treating board as empty: {}", category, e);
            (Vec::new(), true)
        }
    };

    let report = ctx.reconcile(category, &snapshot).await?;
    let summary = ctx.summarize(category).await?;
    if summary.has_alerts() {
        log::warn!(
            "{}: {} flight(s) not rolling off the display",
            category,
            summary.flagged.len()
        );
    }

    Ok(CycleOutcome {
        category,
        fetch_failed,
        report,
        summary,
    })
}

/// Run the given categories one after another.
pub async fn run_scrape(
    ctx: &MonitorContext,
    producer: &dyn SnapshotProducer,
    categories: &[Category],
) -> Result<Vec<CycleOutcome>> {
    let mut outcomes = Vec::with_capacity(categories.len());
    for &category in categories {
        outcomes.push(run_cycle(ctx, producer, category).await?);
    }
    Ok(outcomes)
}

/// Repeat cycles every `run_every_secs` until `shutdown` resolves.
///
/// Categories run concurrently within a tick. A failed cycle is logged and
/// retried on the next tick. After each tick the JSON summary file is
/// refreshed. A tick in progress always completes before shutdown.
pub async fn run_watch(
    ctx: &MonitorContext,
    producer: &dyn SnapshotProducer,
    shutdown: impl Future<Output = ()>,
) -> Result<usize> {
    let period = Duration::from_secs(ctx.config().monitor.run_every_secs);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    log::info!("Watching every {}s", period.as_secs());
    let mut ticks = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("Shutdown requested, stopping after {} tick(s)", ticks);
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                let results = join_all(
                    Category::ALL.iter().map(|&category| run_cycle(ctx, producer, category)),
                )
                .await;
                for result in results {
                    if let Err(e) = result {
                        log::error!("Cycle failed: {}", e);
                    }
                }
                match ctx.summarize_all().await {
                    Ok(summaries) => {
                        let document = json::summary_json(&summaries);
                        if let Err(e) =
                            json::write_summary_file(&ctx.config().monitor.summary_file, &document).await
                        {
                            log::error!("Failed to write summary file: {}", e);
                        }
                    }
                    Err(e) => log::error!("Summary failed: {}", e),
                }
            }
        }
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::error::AppError;
    use crate::models::{CategoryProfile, Config, FlightRecord};
    use crate::storage::SqliteStorage;
    use crate::utils::time::ManualClock;

    /// Serves a fixed board per call, or fails when the script is empty.
    struct ScriptedProducer {
        boards: std::sync::Mutex<Vec<Vec<FlightRecord>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProducer {
        fn new(boards: Vec<Vec<FlightRecord>>) -> Self {
            Self {
                boards: std::sync::Mutex::new(boards),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SnapshotProducer for ScriptedProducer {
        async fn fetch(&self, _profile: &CategoryProfile) -> Result<Vec<FlightRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut boards = self.boards.lock().unwrap();
            if boards.is_empty() {
                return Err(AppError::fetch("scripted", "board unavailable"));
            }
            Ok(boards.remove(0))
        }
    }

    fn context(config: Config) -> (MonitorContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_716_962_400));
        let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        (MonitorContext::new(config, store, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_scrape_runs_categories_in_order() {
        let (ctx, _) = context(Config::default());
        let producer = ScriptedProducer::new(vec![
            vec![FlightRecord::new("VA1", "Boarding")],
            vec![FlightRecord::new("QF2", "Landed")],
        ]);

        let outcomes = run_scrape(&ctx, &producer, &Category::ALL).await.unwrap();

        assert_eq!(outcomes[0].category, Category::Departures);
        assert_eq!(outcomes[0].report.inserted, vec!["VA1"]);
        assert_eq!(outcomes[1].category, Category::Arrivals);
        assert_eq!(outcomes[1].summary.completed, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_counts_as_empty_board() {
        let (ctx, clock) = context(Config::default());
        let producer = ScriptedProducer::new(vec![vec![FlightRecord::new("QF2", "Delayed")]]);

        run_cycle(&ctx, &producer, Category::Arrivals).await.unwrap();
        clock.advance_mins(1);
        let outcome = run_cycle(&ctx, &producer, Category::Arrivals).await.unwrap();

        assert!(outcome.fetch_failed);
        assert_eq!(outcome.report.rolled, vec!["QF2"]);
        assert_eq!(outcome.summary.scheduled, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_within_grace_keeps_board() {
        let mut config = Config::default();
        config.arrivals.empty_snapshot_grace = 2;
        let (ctx, _) = context(config);
        let producer = ScriptedProducer::new(vec![vec![FlightRecord::new("QF2", "Delayed")]]);

        run_cycle(&ctx, &producer, Category::Arrivals).await.unwrap();
        let outcome = run_cycle(&ctx, &producer, Category::Arrivals).await.unwrap();

        assert!(outcome.report.roll_suppressed);
        assert_eq!(outcome.summary.scheduled, 1);
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.monitor.summary_file = tmp.path().join("summary.json");
        let (ctx, _) = context(config);
        let producer = ScriptedProducer::new(vec![
            vec![FlightRecord::new("VA1", "")],
            vec![FlightRecord::new("QF2", "")],
        ]);

        let ticks = run_watch(
            &ctx,
            &producer,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await
        .unwrap();

        assert_eq!(ticks, 1);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(written["departures"]["scheduled"], 1);
        assert_eq!(written["arrivals"]["scheduled"], 1);
    }
}
