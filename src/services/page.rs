// src/services/page.rs

//! Producers reading server-rendered or saved board pages.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{CategoryProfile, CrawlerConfig, FlightRecord};
use crate::services::{RowParser, SnapshotProducer};
use crate::utils::http;

/// Fetches the board with a plain GET.
///
/// Only useful when the board is rendered server side.
pub struct HttpProducer {
    client: Client,
    parser: RowParser,
}

impl HttpProducer {
    pub fn new(config: &CrawlerConfig, parser: RowParser) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            parser,
        })
    }
}

#[async_trait]
impl SnapshotProducer for HttpProducer {
    async fn fetch(&self, profile: &CategoryProfile) -> Result<Vec<FlightRecord>> {
        log::info!("{}: GET {}", profile.category, profile.source_url);
        let html = http::fetch_text(&self.client, &profile.source_url).await?;
        let rows = self.parser.parse(&html);
        log::info!("{}: {} rows read", profile.category, rows.len());
        Ok(rows)
    }
}

/// Reads saved board pages from disk.
///
/// `path` is either a single HTML file used for every category, or a
/// directory holding `arrivals.html` and `departures.html`.
pub struct FileProducer {
    path: PathBuf,
    parser: RowParser,
}

impl FileProducer {
    pub fn new(path: impl Into<PathBuf>, parser: RowParser) -> Self {
        Self {
            path: path.into(),
            parser,
        }
    }

    fn page_path(&self, profile: &CategoryProfile) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{}.html", profile.category))
        } else {
            self.path.clone()
        }
    }
}

#[async_trait]
impl SnapshotProducer for FileProducer {
    async fn fetch(&self, profile: &CategoryProfile) -> Result<Vec<FlightRecord>> {
        let path = self.page_path(profile);
        let html = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::fetch(path.display().to_string(), e))?;
        let rows = self.parser.parse(&html);
        log::info!(
            "{}: {} rows read from {}",
            profile.category,
            rows.len(),
            path.display()
        );
        Ok(rows)
    }
}
