use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the pipeline series.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` (Prometheus exposition format) and `/health`.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/metrics",
                get(move || {
                    let h = handle.clone();
                    async move { h.render() }
                }),
            )
    }

    /// Serve the router in the background.
    pub async fn serve(&self, addr: SocketAddr) -> Result<tokio::task::JoinHandle<()>> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        let app = self.router();
        tracing::info!(%addr, "metrics endpoint listening");

        // Histogram buffers are only drained on render or upkeep.
        let upkeep = self.handle.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                tick.tick().await;
                upkeep.run_upkeep();
            }
        });

        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = ?e, "metrics server stopped");
            }
        }))
    }
}

fn describe_all() {
    describe_counter!("posts_collected_total", "Posts returned by the feed collector.");
    describe_counter!("posts_skipped_total", "Collected posts rejected by the retweet/empty filter.");
    describe_counter!("collector_errors_total", "Browser or collection failures.");
    describe_counter!("classifier_calls_total", "Classification prompts sent.");
    describe_counter!("classifier_fallback_total", "Classifications replaced by the error sentinel.");
    describe_counter!("reports_generated_total", "Reports parsed successfully.");
    describe_counter!("report_fallback_total", "Reports replaced by the placeholder.");
    describe_counter!("store_errors_total", "Primary store or mirror write failures.");
    describe_counter!("cycle_errors_total", "Cycles abandoned by an unhandled error.");
    describe_histogram!("cycle_duration_ms", "Wall time of one pipeline cycle in milliseconds.");
    describe_histogram!("collector_duration_ms", "Wall time of one feed collection in milliseconds.");
    describe_gauge!("pipeline_last_cycle_ts", "Unix ts when the last cycle finished.");
}
