//! Backfills the primary `posts` table from a CSV export of the legacy
//! analysis spreadsheet.
//!
//! Usage: `migrate [PATH]` (defaults to `store.results_backup_path`).

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use trump_post_analyzer::config::AppConfig;
use trump_post_analyzer::store::migrate::{load_legacy_rows, upload_in_batches, BATCH_SIZE};
use trump_post_analyzer::store::supabase::SupabaseStore;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    // Only the store section matters here; no LLM key required.
    let store_cfg = AppConfig::load_unresolved()?
        .store
        .resolve(|key: &str| std::env::var(key).ok());
    let Some((url, key)) = store_cfg.supabase() else {
        bail!("SUPABASE_URL and SUPABASE_KEY must be set");
    };
    let store = SupabaseStore::new(
        url,
        key,
        &store_cfg.posts_table,
        &store_cfg.reports_table,
        Duration::from_secs(store_cfg.timeout_secs),
    )?;

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| store_cfg.results_backup_path.clone());
    tracing::info!(path = %path.display(), "reading legacy export");

    let (rows, stats) = load_legacy_rows(&path)?;
    tracing::info!(
        rows = rows.len(),
        unreadable = stats.unreadable,
        without_url = stats.without_url,
        batch_size = BATCH_SIZE,
        "rows mapped, starting upload"
    );

    let summary = upload_in_batches(&store, &rows, BATCH_SIZE).await;
    tracing::info!(
        uploaded = summary.uploaded,
        batches = summary.batches,
        failed = summary.failed_batches,
        "migration finished"
    );
    if summary.failed_batches > 0 {
        bail!("{} of {} batches failed", summary.failed_batches, summary.batches);
    }
    Ok(())
}
