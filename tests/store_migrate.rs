// tests/store_migrate.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Mutex;
use tempfile::tempdir;

use trump_post_analyzer::store::migrate::{
    load_legacy_rows, upload_in_batches, LoadStats, UploadSummary, BATCH_SIZE,
};
use trump_post_analyzer::store::{PostRow, PrimaryStore, ReportRow, StoredPost};

/// Records every batch; fails the batch whose index is `fail_batch`.
#[derive(Default)]
struct BatchRecorder {
    fail_batch: Option<usize>,
    batches: Mutex<Vec<Vec<PostRow>>>,
}

#[async_trait]
impl PrimaryStore for BatchRecorder {
    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<Vec<StoredPost>> {
        let mut batches = self.batches.lock().unwrap();
        let idx = batches.len();
        batches.push(rows.to_vec());
        if self.fail_batch == Some(idx) {
            bail!("timeout");
        }
        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, r)| StoredPost {
                id: (idx * 1000 + i) as i64,
                url: r.url.clone(),
            })
            .collect())
    }

    async fn upsert_report(&self, _row: &ReportRow) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "batch-recorder"
    }
}

fn legacy_export(rows: usize) -> String {
    let mut csv = String::from(
        "time_str,time,content,url,act_on_market,sentiment_score,market_impact_score,keywords,sector,reason\n",
    );
    for i in 0..rows {
        writeln!(
            csv,
            "\"Nov 12, 2025, 09:30 AM\",2025-11-11 19:30:00,post {i},https://truthsocial.com/@realDonaldTrump/{i},Indirect,0.2,0.3,\"['tariffs', 'China']\",\"['Industrials']\",Trade."
        )
        .unwrap();
    }
    // No URL, then a score that is not a number.
    csv.push_str("\"Nov 12, 2025, 09:30 AM\",,orphan,,No,0,0,[],[],x\n");
    csv.push_str("\"Nov 12, 2025, 09:30 AM\",,bad,https://x/bad,No,high,0,[],[],x\n");
    csv
}

#[test]
fn legacy_export_maps_onto_post_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged_all.csv");
    std::fs::write(&path, legacy_export(3)).unwrap();

    let (rows, stats) = load_legacy_rows(&path).unwrap();
    assert_eq!(stats, LoadStats { unreadable: 1, without_url: 1 });
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].impact_on_market, "Indirect");
    assert_eq!(rows[0].keywords, "tariffs, China");
    assert_eq!(rows[0].sector, "Industrials");
    assert_eq!(rows[0].time_str, "Nov 12, 2025, 09:30 AM");
    assert!((rows[0].market_impact_score - 0.3).abs() < 1e-9);
}

#[test]
fn missing_export_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(load_legacy_rows(&dir.path().join("nope.csv")).is_err());
}

#[tokio::test]
async fn uploads_in_batches_of_one_hundred() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged_all.csv");
    std::fs::write(&path, legacy_export(250)).unwrap();
    let (rows, _) = load_legacy_rows(&path).unwrap();

    let store = BatchRecorder::default();
    let summary = upload_in_batches(&store, &rows, BATCH_SIZE).await;

    assert_eq!(
        summary,
        UploadSummary {
            batches: 3,
            uploaded: 250,
            failed_batches: 0,
        }
    );
    let sizes: Vec<usize> = store.batches.lock().unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
}

#[tokio::test]
async fn failed_batch_does_not_stop_the_rest() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("merged_all.csv");
    std::fs::write(&path, legacy_export(250)).unwrap();
    let (rows, _) = load_legacy_rows(&path).unwrap();

    let store = BatchRecorder {
        fail_batch: Some(1),
        ..BatchRecorder::default()
    };
    let summary = upload_in_batches(&store, &rows, BATCH_SIZE).await;

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.failed_batches, 1);
    assert_eq!(summary.uploaded, 150);
}
