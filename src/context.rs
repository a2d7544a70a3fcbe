// src/context.rs

//! Shared monitor state injected into commands and HTTP handlers.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::{Category, CategoryProfile, Config, FlightEntry, FlightRecord, Summary};
use crate::pipeline::{ReconcileReport, Reconciler, Summarizer};
use crate::storage::{self, HistoryStore};
use crate::utils::time::{Clock, SystemClock};

/// Engine and summarizer of one category.
struct CategoryMonitor {
    engine: Mutex<Reconciler>,
    summarizer: Summarizer,
}

impl CategoryMonitor {
    fn new(profile: CategoryProfile, store: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: Mutex::new(Reconciler::new(
                profile.clone(),
                Arc::clone(&store),
                Arc::clone(&clock),
            )),
            summarizer: Summarizer::new(profile, store, clock),
        }
    }
}

/// Everything a cycle, a report or a request needs.
///
/// Reconciliation for a category is serialised by that category's mutex;
/// summaries and history reads never take it.
pub struct MonitorContext {
    config: Config,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    arrivals: CategoryMonitor,
    departures: CategoryMonitor,
}

impl MonitorContext {
    pub fn new(config: Config, store: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>) -> Self {
        let arrivals = CategoryMonitor::new(
            config.profile(Category::Arrivals),
            Arc::clone(&store),
            Arc::clone(&clock),
        );
        let departures = CategoryMonitor::new(
            config.profile(Category::Departures),
            Arc::clone(&store),
            Arc::clone(&clock),
        );
        Self {
            config,
            store,
            clock,
            arrivals,
            departures,
        }
    }

    /// Open the configured store and use the system clock.
    pub fn open(config: Config) -> Result<Self> {
        let store = storage::open_store(&config)?;
        Ok(Self::new(config, store, Arc::new(SystemClock)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn monitor(&self, category: Category) -> &CategoryMonitor {
        match category {
            Category::Arrivals => &self.arrivals,
            Category::Departures => &self.departures,
        }
    }

    pub fn profile(&self, category: Category) -> &CategoryProfile {
        self.monitor(category).summarizer.profile()
    }

    /// Reconcile a snapshot, waiting for any in-flight reconciliation of the same category.
    pub async fn reconcile(
        &self,
        category: Category,
        snapshot: &[FlightRecord],
    ) -> Result<ReconcileReport> {
        let mut engine = self.monitor(category).engine.lock().await;
        engine.reconcile(snapshot).await
    }

    pub async fn summarize(&self, category: Category) -> Result<Summary> {
        self.monitor(category).summarizer.summarize().await
    }

    /// Summaries for every category, in scrape order.
    pub async fn summarize_all(&self) -> Result<Vec<Summary>> {
        let mut summaries = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            summaries.push(self.summarize(category).await?);
        }
        Ok(summaries)
    }

    pub async fn flights_today(&self, category: Category) -> Result<Vec<FlightEntry>> {
        self.monitor(category).summarizer.flights_today().await
    }

    /// Summary plus today's history for every category.
    pub async fn day_report(&self) -> Result<Vec<(Summary, Vec<FlightEntry>)>> {
        let mut sections = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let summary = self.summarize(category).await?;
            let flights = self.flights_today(category).await?;
            sections.push((summary, flights));
        }
        Ok(sections)
    }
}
