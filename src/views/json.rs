//! JSON summary document.
//!
//! ```json
//! {
//!   "arrivals":   { "scheduled": 4, "landed": 9, "cancelled": 0, "flights_web_display_errors": [] },
//!   "departures": { "scheduled": 6, "departed": 8, "cancelled": 1, "flights_web_display_errors": [
//!       { "flight_number": "VA7", "minutes_since_update": 75, "status": "Boarding" }
//!   ] }
//! }
//! ```

use std::path::Path;

use serde_json::{Map, Value, json};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::models::Summary;

/// Summary object for one category.
pub fn category_json(summary: &Summary) -> Value {
    let mut obj = Map::new();
    obj.insert("scheduled".into(), json!(summary.scheduled));
    obj.insert(
        summary.category.terminal_label().into(),
        json!(summary.completed),
    );
    obj.insert("cancelled".into(), json!(summary.cancelled));
    obj.insert(
        "flights_web_display_errors".into(),
        json!(summary.flagged),
    );
    Value::Object(obj)
}

/// `{category: summary}` for every given category.
pub fn summary_json(summaries: &[Summary]) -> Value {
    let obj: Map<String, Value> = summaries
        .iter()
        .map(|s| (s.category.to_string(), category_json(s)))
        .collect();
    Value::Object(obj)
}

/// Write the document atomically (temp file, then rename).
pub async fn write_summary_file(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(document)?;
    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    log::info!("Summary written to {}", path.display());
    Ok(())
}
