//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Category;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Process-level settings (store, schedule, endpoints)
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Browser / HTTP fetch behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Row and field selectors for the flight board
    #[serde(default)]
    pub selectors: SelectorsConfig,

    /// Arrivals board settings
    #[serde(default)]
    pub arrivals: CategoryConfig,

    /// Departures board settings
    #[serde(default)]
    pub departures: CategoryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `GRID_URL`, `ARRIVALS_TIMEOUT`, `DEPARTURES_TIMEOUT`,
    /// `WEB_SERVICES_PORT`, `SUMMARY_FILE`. Unparseable numbers are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GRID_URL") {
            log::info!("Selenium grid URL set from environment: {}", url);
            self.crawler.grid_url = url;
        }
        for category in Category::ALL {
            let key = match category {
                Category::Arrivals => "ARRIVALS_TIMEOUT",
                Category::Departures => "DEPARTURES_TIMEOUT",
            };
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<i64>() {
                    Ok(mins) => {
                        log::info!("{} warn_after set from environment: {} min", category, mins);
                        self.category_mut(category).warn_after_mins = Some(mins);
                    }
                    Err(e) => log::warn!("Ignoring {}={:?}: {}", key, raw, e),
                }
            }
        }
        if let Some(raw) = lookup("WEB_SERVICES_PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => {
                    log::info!("Web services port set from environment: {}", port);
                    self.monitor.web_port = port;
                }
                Err(e) => log::warn!("Ignoring WEB_SERVICES_PORT={:?}: {}", raw, e),
            }
        }
        if let Some(path) = lookup("SUMMARY_FILE") {
            log::info!("Summary file set from environment: {}", path);
            self.monitor.summary_file = PathBuf::from(path);
        }
    }

    pub fn category(&self, category: Category) -> &CategoryConfig {
        match category {
            Category::Arrivals => &self.arrivals,
            Category::Departures => &self.departures,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut CategoryConfig {
        match category {
            Category::Arrivals => &mut self.arrivals,
            Category::Departures => &mut self.departures,
        }
    }

    /// Resolve the engine profile for a category, filling category defaults.
    pub fn profile(&self, category: Category) -> CategoryProfile {
        let raw = self.category(category);
        let base = CategoryProfile::defaults(category);
        CategoryProfile {
            category,
            source_url: raw.url.clone(),
            warn_after_mins: raw.warn_after_mins.unwrap_or(base.warn_after_mins),
            terminal_statuses: raw
                .terminal_statuses
                .clone()
                .unwrap_or(base.terminal_statuses),
            monitored_statuses: raw
                .monitored_statuses
                .clone()
                .unwrap_or(base.monitored_statuses),
            scheduled_statuses: raw
                .scheduled_statuses
                .clone()
                .unwrap_or(base.scheduled_statuses),
            cancelled_status: raw.cancelled_status.clone(),
            empty_snapshot_grace: raw.empty_snapshot_grace,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.run_every_secs == 0 {
            return Err(AppError::validation("monitor.run_every_secs must be > 0"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.fetch_mode == FetchMode::WebDriver {
            url::Url::parse(&self.crawler.grid_url).map_err(|e| {
                AppError::validation(format!("crawler.grid_url is not a URL: {e}"))
            })?;
        }
        if self.selectors.row.trim().is_empty() {
            return Err(AppError::validation("selectors.row is empty"));
        }
        for category in Category::ALL {
            let profile = self.profile(category);
            if profile.source_url.trim().is_empty() {
                return Err(AppError::validation(format!("{category}.url is empty")));
            }
            url::Url::parse(&profile.source_url).map_err(|e| {
                AppError::validation(format!("{category}.url is not a URL: {e}"))
            })?;
            if profile.warn_after_mins <= 0 {
                return Err(AppError::validation(format!(
                    "{category}.warn_after_mins must be > 0"
                )));
            }
            if profile.terminal_statuses.is_empty() {
                return Err(AppError::validation(format!(
                    "{category}.terminal_statuses is empty"
                )));
            }
        }
        Ok(())
    }
}

/// Which backend holds the flight history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Json,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// History backend
    #[serde(default)]
    pub store: StoreKind,

    /// SQLite database file (sqlite backend)
    #[serde(default = "defaults::db_file")]
    pub db_file: PathBuf,

    /// Directory of per-category JSON files (json backend)
    #[serde(default = "defaults::history_dir")]
    pub history_dir: PathBuf,

    /// Seconds between scrape cycles in watch mode
    #[serde(default = "defaults::run_every")]
    pub run_every_secs: u64,

    /// Port of the status endpoint
    #[serde(default = "defaults::web_port")]
    pub web_port: u16,

    /// Where `print --format json` writes the summary
    #[serde(default = "defaults::summary_file")]
    pub summary_file: PathBuf,

    /// Default log filter when not verbose
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            db_file: defaults::db_file(),
            history_dir: defaults::history_dir(),
            run_every_secs: defaults::run_every(),
            web_port: defaults::web_port(),
            summary_file: defaults::summary_file(),
            log_level: defaults::log_level(),
        }
    }
}

/// How the flight board page is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Render through a remote Selenium grid
    #[default]
    WebDriver,
    /// Plain HTTP GET of server-rendered HTML
    Http,
}

/// Browser and HTTP behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default)]
    pub fetch_mode: FetchMode,

    /// Selenium grid endpoint
    #[serde(default = "defaults::grid_url")]
    pub grid_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// How long to wait for the first flight row to render
    #[serde(default = "defaults::element_wait")]
    pub element_wait_secs: u64,

    /// Pause between scroll steps while the board lazy-loads
    #[serde(default = "defaults::scroll_pause")]
    pub scroll_pause_ms: u64,

    /// Upper bound on scroll steps
    #[serde(default = "defaults::max_scrolls")]
    pub max_scrolls: usize,

    /// Extra Chrome arguments for the remote session
    #[serde(default = "defaults::browser_args")]
    pub browser_args: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::default(),
            grid_url: defaults::grid_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            element_wait_secs: defaults::element_wait(),
            scroll_pause_ms: defaults::scroll_pause(),
            max_scrolls: defaults::max_scrolls(),
            browser_args: defaults::browser_args(),
        }
    }
}

/// A CSS selector plus which match inside the row to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub css: String,
    #[serde(default)]
    pub index: usize,
}

impl FieldSelector {
    pub fn new(css: &str, index: usize) -> Self {
        Self {
            css: css.to_string(),
            index,
        }
    }
}

/// Selectors describing one flight row on the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorsConfig {
    #[serde(default = "defaults::row_selector")]
    pub row: String,
    #[serde(default = "defaults::flight_number_selector")]
    pub flight_number: FieldSelector,
    #[serde(default = "defaults::origin_selector")]
    pub origin: FieldSelector,
    #[serde(default = "defaults::destination_selector")]
    pub destination: FieldSelector,
    #[serde(default = "defaults::departure_selector")]
    pub departure_time: FieldSelector,
    #[serde(default = "defaults::arrival_selector")]
    pub arrival_time: FieldSelector,
    #[serde(default = "defaults::gate_selector")]
    pub gate: FieldSelector,
    #[serde(default = "defaults::status_selector")]
    pub status: FieldSelector,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            row: defaults::row_selector(),
            flight_number: defaults::flight_number_selector(),
            origin: defaults::origin_selector(),
            destination: defaults::destination_selector(),
            departure_time: defaults::departure_selector(),
            arrival_time: defaults::arrival_selector(),
            gate: defaults::gate_selector(),
            status: defaults::status_selector(),
        }
    }
}

/// Per-board settings as written in the config file.
///
/// Unset optional fields fall back to the category defaults in
/// [`CategoryProfile::defaults`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Page showing the board
    #[serde(default)]
    pub url: String,

    /// Minutes without a status change before an open flight is flagged
    #[serde(default)]
    pub warn_after_mins: Option<i64>,

    #[serde(default)]
    pub terminal_statuses: Option<Vec<String>>,

    #[serde(default)]
    pub monitored_statuses: Option<Vec<String>>,

    #[serde(default)]
    pub scheduled_statuses: Option<Vec<String>>,

    #[serde(default = "defaults::cancelled_status")]
    pub cancelled_status: String,

    /// Consecutive empty snapshots tolerated before they roll the board
    #[serde(default)]
    pub empty_snapshot_grace: u32,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            warn_after_mins: None,
            terminal_statuses: None,
            monitored_statuses: None,
            scheduled_statuses: None,
            cancelled_status: defaults::cancelled_status(),
            empty_snapshot_grace: 0,
        }
    }
}

/// Fully resolved settings for one category's engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProfile {
    pub category: Category,
    pub source_url: String,
    pub warn_after_mins: i64,
    pub terminal_statuses: Vec<String>,
    pub monitored_statuses: Vec<String>,
    pub scheduled_statuses: Vec<String>,
    pub cancelled_status: String,
    pub empty_snapshot_grace: u32,
}

impl CategoryProfile {
    /// Built-in settings for a category with no source URL.
    pub fn defaults(category: Category) -> Self {
        let (warn_after_mins, terminal, mut monitored) = match category {
            Category::Arrivals => (
                20,
                defaults::strings(&["Landed", "Early"]),
                defaults::strings(&["Landed"]),
            ),
            Category::Departures => (60, defaults::strings(&["Departed"]), Vec::new()),
        };
        monitored.extend(defaults::strings(&[
            "Delayed",
            "Open",
            "Final Call",
            "Boarding",
            "On Time",
        ]));
        Self {
            category,
            source_url: String::new(),
            warn_after_mins,
            terminal_statuses: terminal,
            monitored_statuses: monitored,
            scheduled_statuses: defaults::strings(&["", "Delayed", "Open", "Final Call"]),
            cancelled_status: defaults::cancelled_status(),
            empty_snapshot_grace: 0,
        }
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal_statuses.iter().any(|s| s == status)
    }

    pub fn is_scheduled(&self, status: &str) -> bool {
        self.scheduled_statuses.iter().any(|s| s == status)
    }

    pub fn is_monitored(&self, status: &str) -> bool {
        self.monitored_statuses.iter().any(|s| s == status)
    }

    pub fn is_cancelled(&self, status: &str) -> bool {
        self.cancelled_status == status
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::FieldSelector;

    pub fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Monitor defaults
    pub fn db_file() -> PathBuf {
        PathBuf::from("storage/flightmon.db")
    }
    pub fn history_dir() -> PathBuf {
        PathBuf::from("storage/history")
    }
    pub fn run_every() -> u64 {
        300
    }
    pub fn web_port() -> u16 {
        8666
    }
    pub fn summary_file() -> PathBuf {
        PathBuf::from("storage/summary.json")
    }
    pub fn log_level() -> String {
        "info".into()
    }

    // Crawler defaults
    pub fn grid_url() -> String {
        "http://localhost:4444".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; flightmon/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn element_wait() -> u64 {
        10
    }
    pub fn scroll_pause() -> u64 {
        2000
    }
    pub fn max_scrolls() -> usize {
        30
    }
    pub fn browser_args() -> Vec<String> {
        strings(&["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"])
    }

    // Board selectors
    pub fn row_selector() -> String {
        ".SearchResultFlightListRow".into()
    }
    pub fn flight_number_selector() -> FieldSelector {
        FieldSelector::new(".flightNumberLogo .resultRow p", 0)
    }
    pub fn origin_selector() -> FieldSelector {
        FieldSelector::new(".col-dest .resultRow p", 0)
    }
    pub fn destination_selector() -> FieldSelector {
        FieldSelector::new(".col-dest .resultRow p", 1)
    }
    pub fn departure_selector() -> FieldSelector {
        FieldSelector::new(".col-sched .resultRow p", 0)
    }
    pub fn arrival_selector() -> FieldSelector {
        FieldSelector::new(".col-sched .resultRow p", 1)
    }
    pub fn gate_selector() -> FieldSelector {
        FieldSelector::new(".col-xs-4.col-sm-3.col-lg-3 .resultRow p", 0)
    }
    pub fn status_selector() -> FieldSelector {
        FieldSelector::new(".col-xs-4.col-sm-3.col-lg-3 .resultRow p", 1)
    }

    // Category defaults
    pub fn cancelled_status() -> String {
        "Cancelled".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.arrivals.url = "https://airport.example/arrivals".into();
        config.departures.url = "https://airport.example/departures".into();
        config
    }

    #[test]
    fn validate_default_config_requires_urls() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = valid_config();
        config.monitor.run_every_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_grid_url() {
        let mut config = valid_config();
        config.crawler.grid_url = "not a url".into();
        assert!(config.validate().is_err());
        config.crawler.fetch_mode = FetchMode::Http;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn profile_uses_category_defaults() {
        let config = valid_config();
        let arrivals = config.profile(Category::Arrivals);
        let departures = config.profile(Category::Departures);

        assert_eq!(arrivals.warn_after_mins, 20);
        assert_eq!(departures.warn_after_mins, 60);
        assert!(arrivals.is_terminal("Landed"));
        assert!(arrivals.is_terminal("Early"));
        assert!(!arrivals.is_terminal("Departed"));
        assert!(departures.is_terminal("Departed"));
        assert!(arrivals.is_monitored("Landed"));
        assert!(!departures.is_monitored("Departed"));
        assert!(arrivals.is_scheduled(""));
    }

    #[test]
    fn partial_toml_section_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [arrivals]
            url = "https://airport.example/arrivals"
            warn_after_mins = 45
            monitored_statuses = ["Delayed"]
            "#,
        )
        .unwrap();

        let profile = config.profile(Category::Arrivals);
        assert_eq!(profile.warn_after_mins, 45);
        assert_eq!(profile.monitored_statuses, vec!["Delayed".to_string()]);
        assert_eq!(profile.terminal_statuses, vec!["Landed", "Early"]);
        assert_eq!(config.monitor.web_port, 8666);
        assert_eq!(config.selectors.status.index, 1);
    }

    #[test]
    fn shipped_config_is_valid() {
        let config: Config = toml::from_str(include_str!("../../storage/config.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.profile(Category::Departures).warn_after_mins, 60);
        assert_eq!(config.selectors.destination.index, 1);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("GRID_URL", "http://grid:4444"),
            ("ARRIVALS_TIMEOUT", "35"),
            ("DEPARTURES_TIMEOUT", "not-a-number"),
            ("WEB_SERVICES_PORT", "9000"),
            ("SUMMARY_FILE", "/tmp/lm.json"),
        ]
        .into_iter()
        .collect();

        let mut config = valid_config();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.crawler.grid_url, "http://grid:4444");
        assert_eq!(config.profile(Category::Arrivals).warn_after_mins, 35);
        assert_eq!(config.profile(Category::Departures).warn_after_mins, 60);
        assert_eq!(config.monitor.web_port, 9000);
        assert_eq!(config.monitor.summary_file, PathBuf::from("/tmp/lm.json"));
    }
}
