//! Service layer for obtaining flight board snapshots.
//!
//! This module contains:
//! - Row extraction from rendered pages (`RowParser`)
//! - Snapshot producers over a Selenium grid (`WebDriverProducer`),
//!   plain HTTP (`HttpProducer`) and saved pages (`FileProducer`)

mod page;
mod rows;
mod webdriver;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CategoryProfile, Config, FetchMode, FlightRecord};

pub use page::{FileProducer, HttpProducer};
pub use rows::RowParser;
pub use webdriver::WebDriverProducer;

/// Source of flight board snapshots.
///
/// An `Ok` empty vector means the board showed no flights. Errors mean the
/// board could not be read at all.
#[async_trait]
pub trait SnapshotProducer: Send + Sync {
    async fn fetch(&self, profile: &CategoryProfile) -> Result<Vec<FlightRecord>>;
}

/// Build the producer selected by `crawler.fetch_mode`.
pub fn build_producer(config: &Config) -> Result<Box<dyn SnapshotProducer>> {
    let parser = RowParser::new(&config.selectors)?;
    Ok(match config.crawler.fetch_mode {
        FetchMode::WebDriver => Box::new(WebDriverProducer::new(
            &config.crawler,
            &config.selectors.row,
            parser,
        )?),
        FetchMode::Http => Box::new(HttpProducer::new(&config.crawler, parser)?),
    })
}
