// src/store/mod.rs
//! Persistence: primary store (upsert by URL / post id) plus a CSV mirror.
//!
//! Nothing here fails the caller. Store and mirror errors are logged and
//! counted; the pipeline keeps going with whatever was saved.

pub mod backup;
pub mod migrate;
pub mod supabase;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::{Classification, Report};
use crate::config::StoreConfig;
use crate::ingest::types::Post;

/// Row of the `posts` table and of the results mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRow {
    pub url: String,
    pub content: String,
    pub time_str: String,
    pub time: String,
    pub impact_on_market: String,
    pub sentiment_score: f64,
    pub market_impact_score: f64,
    pub keywords: String,
    pub sector: String,
    pub reason: String,
}

impl PostRow {
    pub fn new(post: &Post, c: &Classification) -> Self {
        Self {
            url: post.url.clone(),
            content: post.content.clone(),
            time_str: post.time_str.clone(),
            time: post.time.clone(),
            impact_on_market: c.impact_on_market.to_string(),
            sentiment_score: c.sentiment_score,
            market_impact_score: c.market_impact_score,
            keywords: c.keywords.join(", "),
            sector: c.sector.join(", "),
            reason: c.reason.clone(),
        }
    }
}

/// Row of the reports (`analyze`) table, keyed by the post identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: i64,
    pub title: String,
    pub forecast: String,
    pub posts: String,
    pub model: f64,
    pub stock: String,
    pub time_str: String,
}

impl ReportRow {
    pub fn new(id: i64, report: &Report, origin_timestamp: &str) -> Self {
        Self {
            id,
            title: report.title.clone(),
            forecast: report.forecast.clone(),
            posts: report.summary.clone(),
            model: report.model,
            stock: report.stock.join(","),
            time_str: origin_timestamp.to_string(),
        }
    }
}

/// Identifier the primary store assigned to a post row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredPost {
    pub id: i64,
    pub url: String,
}

#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Upsert on `url`; returns the identifiers of the written rows.
    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<Vec<StoredPost>>;
    /// Upsert on `id`.
    async fn upsert_report(&self, row: &ReportRow) -> Result<()>;
    fn name(&self) -> &'static str;
}

pub struct Storage {
    primary: Option<Arc<dyn PrimaryStore>>,
    raw_path: PathBuf,
    results_path: PathBuf,
}

impl Storage {
    pub fn new(
        primary: Option<Arc<dyn PrimaryStore>>,
        raw_path: PathBuf,
        results_path: PathBuf,
    ) -> Self {
        Self {
            primary,
            raw_path,
            results_path,
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self> {
        let primary: Option<Arc<dyn PrimaryStore>> = match cfg.supabase() {
            Some((url, key)) => {
                let store = supabase::SupabaseStore::new(
                    url,
                    key,
                    &cfg.posts_table,
                    &cfg.reports_table,
                    Duration::from_secs(cfg.timeout_secs),
                )?;
                tracing::info!(url, "supabase store configured");
                Some(Arc::new(store))
            }
            None => {
                tracing::warn!("no Supabase settings; using the CSV mirror only");
                None
            }
        };
        Ok(Self::new(
            primary,
            cfg.raw_backup_path.clone(),
            cfg.results_backup_path.clone(),
        ))
    }

    /// Dedup seed. Any read problem yields an empty set.
    pub fn existing_urls(&self) -> HashSet<String> {
        match backup::read_url_column(&self.raw_path) {
            Ok(urls) => urls,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.raw_path.display(), "could not read dedup seed");
                HashSet::new()
            }
        }
    }

    /// Merge collected posts into the raw backup (new rows win per URL).
    pub fn save_raw_posts(&self, posts: &[Post]) {
        if posts.is_empty() {
            return;
        }
        match backup::merge_into_file(&self.raw_path, posts.to_vec(), |p: &Post| p.url.as_str()) {
            Ok(total) => tracing::info!(added = posts.len(), total, "raw posts cached"),
            Err(e) => {
                counter!("store_errors_total", "target" => "raw_backup").increment(1);
                tracing::warn!(error = ?e, "raw backup write failed");
            }
        }
    }

    /// Upsert classified posts and mirror them. Returns `url -> id` for every
    /// row the primary store reported back.
    pub async fn save_results(&self, rows: &[PostRow]) -> HashMap<String, i64> {
        if rows.is_empty() {
            return HashMap::new();
        }

        let mut ids = HashMap::new();
        if let Some(primary) = &self.primary {
            match primary.upsert_posts(rows).await {
                Ok(stored) => {
                    tracing::info!(store = primary.name(), rows = rows.len(), returned = stored.len(), "results upserted");
                    ids.extend(stored.into_iter().map(|s| (s.url, s.id)));
                }
                Err(e) => {
                    counter!("store_errors_total", "target" => "posts").increment(1);
                    tracing::warn!(error = ?e, store = primary.name(), "results upsert failed");
                }
            }
        }

        match backup::merge_into_file(&self.results_path, rows.to_vec(), |r: &PostRow| r.url.as_str()) {
            Ok(total) => tracing::info!(total, path = %self.results_path.display(), "results mirrored"),
            Err(e) => {
                counter!("store_errors_total", "target" => "results_backup").increment(1);
                tracing::warn!(error = ?e, "results mirror write failed");
            }
        }

        ids
    }

    pub async fn save_report(&self, id: i64, report: &Report, origin_timestamp: &str) {
        let Some(primary) = &self.primary else {
            tracing::warn!(id, "no primary store; report not saved");
            return;
        };
        let row = ReportRow::new(id, report, origin_timestamp);
        match primary.upsert_report(&row).await {
            Ok(()) => tracing::info!(id, store = primary.name(), "report saved"),
            Err(e) => {
                counter!("store_errors_total", "target" => "reports").increment(1);
                tracing::warn!(error = ?e, id, "report upsert failed");
            }
        }
    }
}
