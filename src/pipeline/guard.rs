//! Empty-snapshot guard.
//!
//! An empty snapshot is indistinguishable from a board that failed to
//! render. The guard decides whether such a snapshot may drive roll
//! detection, which would otherwise mark every open flight as rolled.
//!
//! With `grace = 0` every empty snapshot rolls the board immediately. With
//! `grace = N` the first `N` consecutive empty snapshots are tolerated and
//! the next one rolls. Any non-empty snapshot resets the count.
//!
//! The count outlives the process: callers [`resume`] it from the history
//! store before a check and write it back afterwards, so one-shot runs from
//! an external scheduler see the same streak as a long-running watch.
//!
//! [`resume`]: EmptySnapshotGuard::resume

/// Guard configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardConfig {
    /// Consecutive empty snapshots tolerated before they are acted on.
    pub grace: u32,
}

/// Outcome of checking one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    /// Snapshot has rows; roll detection runs normally
    Proceed { snapshot_size: usize },
    /// Empty snapshot inside the grace window; skip roll detection
    Suppressed { consecutive_empty: u32, grace: u32 },
    /// Empty snapshot past the grace window; roll everything still open
    RollAll { consecutive_empty: u32 },
}

impl GuardResult {
    pub fn allows_roll(&self) -> bool {
        !matches!(self, GuardResult::Suppressed { .. })
    }
}

/// Tracks consecutive empty snapshots for one category.
#[derive(Debug, Clone)]
pub struct EmptySnapshotGuard {
    config: GuardConfig,
    consecutive_empty: u32,
}

impl EmptySnapshotGuard {
    pub fn new(grace: u32) -> Self {
        Self::with_config(GuardConfig { grace })
    }

    pub fn with_config(config: GuardConfig) -> Self {
        Self {
            config,
            consecutive_empty: 0,
        }
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.consecutive_empty
    }

    /// Continue from a streak recorded by an earlier run.
    pub fn resume(&mut self, consecutive_empty: u32) {
        self.consecutive_empty = consecutive_empty;
    }

    /// Record a snapshot of `snapshot_size` identified flights and decide.
    pub fn check(&mut self, snapshot_size: usize) -> GuardResult {
        if snapshot_size > 0 {
            self.consecutive_empty = 0;
            return GuardResult::Proceed { snapshot_size };
        }

        self.consecutive_empty = self.consecutive_empty.saturating_add(1);
        if self.consecutive_empty <= self.config.grace {
            GuardResult::Suppressed {
                consecutive_empty: self.consecutive_empty,
                grace: self.config.grace,
            }
        } else {
            GuardResult::RollAll {
                consecutive_empty: self.consecutive_empty,
            }
        }
    }

    /// Check and log; returns whether roll detection may run.
    pub fn admit(&mut self, snapshot_size: usize) -> bool {
        let result = self.check(snapshot_size);
        match &result {
            GuardResult::Proceed { snapshot_size } => {
                log::debug!("Empty-snapshot guard: PROCEED ({} rows)", snapshot_size);
            }
            GuardResult::Suppressed {
                consecutive_empty,
                grace,
            } => {
                log::warn!(
                    "Empty-snapshot guard: empty snapshot {}/{} tolerated, roll detection skipped",
                    consecutive_empty,
                    grace
                );
            }
            GuardResult::RollAll { consecutive_empty } => {
                log::warn!(
                    "Empty-snapshot guard: {} consecutive empty snapshot(s), rolling every open flight",
                    consecutive_empty
                );
            }
        }
        result.allows_roll()
    }
}

impl Default for EmptySnapshotGuard {
    fn default() -> Self {
        Self::with_config(GuardConfig::default())
    }
}
