// src/services/webdriver.rs

//! Snapshot producer driving a remote browser through a Selenium grid.
//!
//! Speaks the W3C WebDriver wire protocol directly over HTTP:
//!
//! 1. `POST /session` opens a headless Chrome session
//! 2. `POST /session/{id}/url` loads the board
//! 3. `POST /session/{id}/execute/sync` scrolls until the page stops growing
//! 4. `POST /session/{id}/elements` waits for the first flight row
//! 5. `GET /session/{id}/source` reads the rendered page
//! 6. `DELETE /session/{id}` always closes the session

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};

use crate::error::{AppError, Result};
use crate::models::{CategoryProfile, CrawlerConfig, FlightRecord};
use crate::services::{RowParser, SnapshotProducer};
use crate::utils::http;

const SCROLL_SCRIPT: &str =
    "window.scrollTo(0, document.body.scrollHeight); return document.body.scrollHeight;";
const ELEMENT_POLL: Duration = Duration::from_millis(500);

/// Every WebDriver response wraps its payload in `value`.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

/// Renders the board in a remote Chrome and parses the resulting page.
pub struct WebDriverProducer {
    client: Client,
    grid_url: String,
    browser_args: Vec<String>,
    row_selector: String,
    element_wait: Duration,
    scroll_pause: Duration,
    max_scrolls: usize,
    parser: RowParser,
}

impl WebDriverProducer {
    pub fn new(config: &CrawlerConfig, row_selector: &str, parser: RowParser) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            grid_url: config.grid_url.trim_end_matches('/').to_string(),
            browser_args: config.browser_args.clone(),
            row_selector: row_selector.to_string(),
            element_wait: Duration::from_secs(config.element_wait_secs),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            max_scrolls: config.max_scrolls,
            parser,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.grid_url, path.trim_start_matches('/'))
    }

    fn capabilities(&self) -> Value {
        let mut args = self.browser_args.clone();
        if !args.iter().any(|a| a.starts_with("--headless")) {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }

    /// Send one command and unwrap its `value`.
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.endpoint(path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        decode_response(status.as_u16(), &body)
            .map_err(|message| AppError::fetch(format!("webdriver {method} {path}"), message))
    }

    async fn open_session(&self) -> Result<String> {
        let value = self
            .call(Method::POST, "session", Some(self.capabilities()))
            .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::fetch("webdriver session", "response has no sessionId"))?;
        log::info!("Connected to Selenium grid {} (session {})", self.grid_url, id);
        Ok(id.to_string())
    }

    async fn close_session(&self, session: &str) -> Result<()> {
        self.call(Method::DELETE, &format!("session/{session}"), None)
            .await?;
        log::info!("Closed browser session {}", session);
        Ok(())
    }

    async fn page_height(&self, session: &str) -> Result<i64> {
        let value = self
            .call(
                Method::POST,
                &format!("session/{session}/execute/sync"),
                Some(json!({ "script": SCROLL_SCRIPT, "args": [] })),
            )
            .await?;
        Ok(value.as_i64().unwrap_or_default())
    }

    /// Scroll to the bottom until the page height stops changing.
    async fn scroll_to_end(&self, session: &str) -> Result<usize> {
        let mut last = self.page_height(session).await?;
        let mut scrolls = 0;
        while scrolls < self.max_scrolls {
            sleep(self.scroll_pause).await;
            let height = self.page_height(session).await?;
            scrolls += 1;
            if height == last {
                break;
            }
            last = height;
        }
        log::info!("Scrolled to end of page after {} scroll actions", scrolls);
        Ok(scrolls)
    }

    /// Poll until at least one flight row exists or the wait expires.
    async fn wait_for_rows(&self, session: &str) -> Result<bool> {
        let deadline = Instant::now() + self.element_wait;
        let body = json!({ "using": "css selector", "value": self.row_selector });
        loop {
            let found = self
                .call(
                    Method::POST,
                    &format!("session/{session}/elements"),
                    Some(body.clone()),
                )
                .await?;
            if found.as_array().is_some_and(|rows| !rows.is_empty()) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(ELEMENT_POLL).await;
        }
    }

    async fn scrape(&self, session: &str, profile: &CategoryProfile) -> Result<Vec<FlightRecord>> {
        self.call(
            Method::POST,
            &format!("session/{session}/url"),
            Some(json!({ "url": profile.source_url })),
        )
        .await?;
        log::info!("{}: opened {}", profile.category, profile.source_url);

        self.scroll_to_end(session).await?;
        if !self.wait_for_rows(session).await? {
            log::info!(
                "{}: timeout waiting for flight rows, board treated as empty",
                profile.category
            );
            return Ok(Vec::new());
        }

        let source = self
            .call(Method::GET, &format!("session/{session}/source"), None)
            .await?;
        let html = source
            .as_str()
            .ok_or_else(|| AppError::fetch("webdriver source", "page source is not a string"))?;
        let rows = self.parser.parse(html);
        log::info!("{}: {} rows scraped", profile.category, rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl SnapshotProducer for WebDriverProducer {
    async fn fetch(&self, profile: &CategoryProfile) -> Result<Vec<FlightRecord>> {
        let session = self.open_session().await?;
        let result = self.scrape(&session, profile).await;
        if let Err(e) = self.close_session(&session).await {
            log::warn!("Failed to close browser session {}: {}", session, e);
        }
        result
    }
}

/// Unwrap a response body, or describe why it failed.
///
/// Error bodies that are not WebDriver JSON (a proxy's HTML 502 page, say)
/// are reported by their HTTP status alone.
fn decode_response(status: u16, body: &str) -> std::result::Result<Value, String> {
    let wire = serde_json::from_str::<WireResponse>(body);
    if !(200..300).contains(&status) {
        let value = wire.map(|w| w.value).unwrap_or(Value::Null);
        return Err(error_message(&value, status));
    }
    wire.map(|w| w.value)
        .map_err(|e| format!("invalid webdriver response: {e}"))
}

/// Human-readable message from a WebDriver error payload.
fn error_message(value: &Value, status: u16) -> String {
    let error = value.get("error").and_then(Value::as_str);
    let message = value.get("message").and_then(Value::as_str);
    match (error, message) {
        (Some(error), Some(message)) => format!("{error}: {message}"),
        (Some(error), None) => error.to_string(),
        _ => format!("HTTP {status}"),
    }
}
