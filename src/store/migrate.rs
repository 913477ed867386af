// src/store/migrate.rs
//! Backfill of the primary `posts` table from a legacy results export.
//!
//! Older exports name the category column `act_on_market` and store list
//! columns as Python-style literals (`['Apple', 'Tesla']`). Rows are mapped
//! onto `PostRow` and upserted on `url` in fixed-size batches.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use super::backup::read_rows_lossy;
use super::{PostRow, PrimaryStore};

pub const BATCH_SIZE: usize = 100;

/// One row of a legacy export. Every column is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LegacyRow {
    pub url: Option<String>,
    pub time_str: Option<String>,
    pub time: Option<String>,
    pub content: Option<String>,
    pub act_on_market: Option<String>,
    pub impact_on_market: Option<String>,
    pub sentiment_score: Option<f64>,
    pub market_impact_score: Option<f64>,
    pub keywords: Option<String>,
    pub sector: Option<String>,
    pub reason: Option<String>,
}

impl LegacyRow {
    /// `None` when the row has no usable URL.
    pub fn into_post_row(self) -> Option<PostRow> {
        let url = self
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty() && u != "nan")?;
        Some(PostRow {
            url,
            content: self.content.unwrap_or_default(),
            time_str: self.time_str.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            impact_on_market: self
                .act_on_market
                .or(self.impact_on_market)
                .unwrap_or_default(),
            sentiment_score: self.sentiment_score.unwrap_or(0.0),
            market_impact_score: self.market_impact_score.unwrap_or(0.0),
            keywords: flatten_list_literal(self.keywords.as_deref().unwrap_or_default()),
            sector: flatten_list_literal(self.sector.as_deref().unwrap_or_default()),
            reason: self.reason.unwrap_or_default(),
        })
    }
}

/// `['a', "b"]` → `a, b`. Anything that is not a bracketed list is kept as is.
pub fn flatten_list_literal(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        return raw.to_string();
    };

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in inner.chars() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => items.push(std::mem::take(&mut current)),
            (_, c) => current.push(c),
        }
    }
    items.push(current);

    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub unreadable: usize,
    pub without_url: usize,
}

/// Reads and maps a legacy export. Unreadable rows and rows without a URL
/// are skipped and counted.
pub fn load_legacy_rows(path: &Path) -> Result<(Vec<PostRow>, LoadStats)> {
    if !path.exists() {
        return Err(anyhow!("{} does not exist", path.display()));
    }
    let (raw, unreadable) = read_rows_lossy::<LegacyRow>(path)?;
    let total = raw.len();
    let rows: Vec<PostRow> = raw.into_iter().filter_map(LegacyRow::into_post_row).collect();
    let stats = LoadStats {
        unreadable,
        without_url: total - rows.len(),
    };
    Ok((rows, stats))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub batches: usize,
    pub uploaded: usize,
    pub failed_batches: usize,
}

/// Upserts `rows` in chunks of `batch_size`. A failed batch is logged and
/// the remaining batches still run.
pub async fn upload_in_batches(
    store: &dyn PrimaryStore,
    rows: &[PostRow],
    batch_size: usize,
) -> UploadSummary {
    let batch_size = batch_size.max(1);
    let mut summary = UploadSummary::default();
    for (i, batch) in rows.chunks(batch_size).enumerate() {
        summary.batches += 1;
        let from = i * batch_size;
        match store.upsert_posts(batch).await {
            Ok(_) => {
                summary.uploaded += batch.len();
                tracing::info!(from, to = from + batch.len(), store = store.name(), "batch saved");
            }
            Err(e) => {
                summary.failed_batches += 1;
                tracing::warn!(error = ?e, from, "batch upsert failed");
            }
        }
    }
    summary
}
