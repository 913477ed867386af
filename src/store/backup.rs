// src/store/backup.rs
//! CSV backup mirror: dedup seed and human-readable copy of stored rows.

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Puts `new` ahead of `existing` and keeps the first row per key, so new
/// values replace old ones while untouched rows keep their order.
pub fn merge_keep_first<T, F>(new: Vec<T>, existing: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(new.len() + existing.len());
    for row in new.into_iter().chain(existing) {
        if seen.insert(key(&row).to_string()) {
            out.push(row);
        }
    }
    out
}

/// Reads all rows; a missing file is an empty table.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows: Vec<T> = Vec::new();
    for rec in rdr.deserialize::<T>() {
        rows.push(rec.with_context(|| format!("reading row from {}", path.display()))?);
    }
    Ok(rows)
}

/// Writes rows through a temp file + rename.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::Writer::from_path(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Like `read_rows`, but rows that fail to deserialize are logged and
/// skipped. Returns the readable rows and the number skipped.
pub fn read_rows_lossy<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    if !path.exists() {
        return Ok((Vec::new(), 0));
    }
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows: Vec<T> = Vec::new();
    let mut skipped = 0;
    for (i, rec) in rdr.deserialize::<T>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                tracing::warn!(path = %path.display(), row = i + 1, error = %e, "skipping unreadable backup row");
            }
        }
    }
    Ok((rows, skipped))
}

/// Merges `new` into the file at `path`. Returns the resulting row count.
/// Unreadable existing rows are dropped so one bad row cannot block writes.
pub fn merge_into_file<T, F>(path: &Path, new: Vec<T>, key: F) -> Result<usize>
where
    T: Serialize + DeserializeOwned,
    F: Fn(&T) -> &str,
{
    if new.is_empty() {
        return Ok(0);
    }
    let (existing, skipped) = read_rows_lossy::<T>(path)?;
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "dropping unreadable rows while merging backup");
    }
    let merged = merge_keep_first(new, existing, key);
    write_rows(path, &merged)?;
    Ok(merged.len())
}

/// Values of the `url` column, whatever else the file contains.
pub fn read_url_column(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let idx = rdr
        .headers()?
        .iter()
        .position(|h| h == "url")
        .ok_or_else(|| anyhow!("{} has no url column", path.display()))?;

    let mut urls = HashSet::new();
    for rec in rdr.records() {
        let rec = match rec {
            Ok(rec) => rec,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable backup row");
                continue;
            }
        };
        if let Some(u) = rec.get(idx).filter(|u| !u.is_empty()) {
            urls.insert(u.to_string());
        }
    }
    Ok(urls)
}
