// src/server.rs

//! Read-only status endpoint.
//!
//! - `GET /`     compact counts widget, reloads every 30 s
//! - `GET /json` summary document for every category
//! - `GET /dump` summary and history tables for today
//!
//! Every request re-runs the summarizer. Store failures are logged and
//! answered with zeroed summaries rather than an error page.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::Html,
    routing::get,
};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::context::MonitorContext;
use crate::error::Result;
use crate::models::{Category, Summary};
use crate::views::{html, json};

pub fn build_router(ctx: Arc<MonitorContext>) -> Router {
    Router::new()
        .route("/", get(widget))
        .route("/json", get(summary))
        .route("/dump", get(dump))
        .with_state(ctx)
}

/// Bind `0.0.0.0:port` and serve until `shutdown` resolves.
pub async fn serve(
    ctx: Arc<MonitorContext>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    log::info!("Serving flight status on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(ctx))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("Status server stopped");
    Ok(())
}

async fn summaries_or_empty(ctx: &MonitorContext) -> Vec<Summary> {
    match ctx.summarize_all().await {
        Ok(summaries) => summaries,
        Err(e) => {
            log::error!("Summary for status endpoint failed: {}", e);
            let day = ctx.clock().today();
            Category::ALL
                .iter()
                .map(|&category| Summary::empty(category, day))
                .collect()
        }
    }
}

async fn widget(State(ctx): State<Arc<MonitorContext>>) -> Html<String> {
    Html(html::render_widget(&summaries_or_empty(&ctx).await))
}

async fn summary(State(ctx): State<Arc<MonitorContext>>) -> Json<Value> {
    Json(json::summary_json(&summaries_or_empty(&ctx).await))
}

async fn dump(State(ctx): State<Arc<MonitorContext>>) -> Html<String> {
    let sections = match ctx.day_report().await {
        Ok(sections) => sections,
        Err(e) => {
            log::error!("History dump failed: {}", e);
            summaries_or_empty(&ctx)
                .await
                .into_iter()
                .map(|s| (s, Vec::new()))
                .collect()
        }
    };
    Html(html::render_dump(&sections, ctx.clock().now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Config, FlightRecord};
    use crate::storage::SqliteStorage;
    use crate::utils::time::ManualClock;

    async fn spawn_server() -> (String, Arc<MonitorContext>) {
        let clock = Arc::new(ManualClock::new(1_716_962_400));
        let store = Arc::new(SqliteStorage::open_in_memory().unwrap());
        let ctx = Arc::new(MonitorContext::new(Config::default(), store, clock));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(Arc::clone(&ctx));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), ctx)
    }

    #[tokio::test]
    async fn test_json_endpoint() {
        let (base, ctx) = spawn_server().await;
        ctx.reconcile(Category::Arrivals, &[FlightRecord::new("QF1", "Landed")])
            .await
            .unwrap();

        let body: Value = reqwest::get(format!("{base}/json"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["arrivals"]["landed"], 1);
        assert_eq!(body["departures"]["departed"], 0);
    }

    #[tokio::test]
    async fn test_html_endpoints() {
        let (base, ctx) = spawn_server().await;
        ctx.reconcile(Category::Departures, &[FlightRecord::new("VA9", "Open")])
            .await
            .unwrap();

        let widget = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(widget.contains("Scheduled: 1"));
        assert!(widget.contains("setTimeout"));

        let dump = reqwest::get(format!("{base}/dump")).await.unwrap().text().await.unwrap();
        assert!(dump.contains("<h1>Flight Information</h1>"));
        assert!(dump.contains("<td>VA9</td>"));
    }
}
