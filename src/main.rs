//! Post monitor binary entrypoint.
//! Loads configuration, wires the pipeline and polls until Ctrl-C.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trump_post_analyzer::metrics::Metrics;
use trump_post_analyzer::{AppConfig, IntervalScheduler, IntervalSchedulerCfg, Pipeline};

/// Compact human-readable logs on stdout; `LOG_FORMAT=json` for JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trump_post_analyzer=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    tracing::info!(
        profile = %cfg.scraper.profile_url,
        interval_secs = cfg.scheduler.interval_secs,
        "post monitor starting"
    );

    // Keep the exporter alive for the whole run.
    let _metrics_task = match cfg.metrics_addr {
        Some(addr) => {
            let metrics = Metrics::init()?;
            Some(metrics.serve(addr).await?)
        }
        None => None,
    };

    let pipeline = Pipeline::from_config(&cfg)?;
    let scheduler = IntervalScheduler::new(IntervalSchedulerCfg::from(cfg.scheduler));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler failed; running until killed");
            std::future::pending::<()>().await;
        }
    };

    let stats = scheduler.run_until(&pipeline, shutdown).await;
    tracing::info!(ok = stats.cycles_ok, failed = stats.cycles_failed, "post monitor stopped");
    Ok(())
}
