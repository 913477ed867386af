// tests/pipeline_cycle.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

use trump_post_analyzer::ai_adapter::{DynLlmClient, LlmClient};
use trump_post_analyzer::analyze::{ImpactClassifier, ReportGenerator};
use trump_post_analyzer::ingest::browser::{BrowserLauncher, BrowserSession};
use trump_post_analyzer::ingest::collector::{CollectorConfig, FeedCollector};
use trump_post_analyzer::ingest::scheduler::RunStats;
use trump_post_analyzer::ingest::types::Post;
use trump_post_analyzer::store::backup::read_rows;
use trump_post_analyzer::store::{PostRow, PrimaryStore, ReportRow, Storage, StoredPost};
use trump_post_analyzer::{
    Cycle, CycleSummary, IntervalScheduler, IntervalSchedulerCfg, NotifierMux, Pipeline,
};

const BASE: &str = "https://truthsocial.com/@realDonaldTrump";

fn url(id: &str) -> String {
    format!("{BASE}/{id}")
}

fn page(posts: &[(&str, &str)]) -> String {
    let mut html = String::from("<html><body>");
    for (i, (id, text)) in posts.iter().enumerate() {
        html.push_str(&format!(
            r#"<div data-index="{i}"><a href="/@realDonaldTrump/{id}"><time title="Nov 12, 2025, 09:30 AM">1h</time></a>
               <div data-testid="status-content"><p>{text}</p></div></div>"#
        ));
    }
    html.push_str("</body></html>");
    html
}

struct FixedSession {
    html: String,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FixedSession {
    async fn render(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }
    async fn scroll_by(&mut self, _px: u32) -> Result<()> {
        Ok(())
    }
    async fn page_source(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }
    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FixedLauncher {
    html: Option<String>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserLauncher for FixedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let Some(html) = self.html.clone() else {
            bail!("chromedriver not reachable");
        };
        Ok(Box::new(FixedSession {
            html,
            closed: self.closed.clone(),
        }))
    }
}

/// Answers the report prompt with a report and everything else with a
/// classification that is Direct only for Nvidia posts.
struct ScriptedLlm;

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, instructions: &str, input: &str) -> Result<String> {
        if instructions.contains("investment reports") {
            return Ok(r#"{"title":"엔비디아 투자","forecast":"A. B. C.","posts":"Summary.","stock":["NVDA"]}"#.into());
        }
        if input.contains("nvidia") {
            Ok(r#"{"impact_on_market":"Direct","sentiment_score":0.8,"market_impact_score":0.9,
                   "keywords":["Nvidia"],"sector":["Information Technology"],
                   "reason":"Praises Nvidia. NVDA."}"#
                .into())
        } else {
            Ok(r#"{"impact_on_market":"No","sentiment_score":0.1,"market_impact_score":0.0,
                   "keywords":[],"sector":[],"reason":"Not market related."}"#
                .into())
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct MemoryStore {
    next_id: AtomicUsize,
    reports: Mutex<Vec<ReportRow>>,
}

#[async_trait]
impl PrimaryStore for MemoryStore {
    async fn upsert_posts(&self, rows: &[PostRow]) -> Result<Vec<StoredPost>> {
        Ok(rows
            .iter()
            .map(|r| StoredPost {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1,
                url: r.url.clone(),
            })
            .collect())
    }

    async fn upsert_report(&self, row: &ReportRow) -> Result<()> {
        self.reports.lock().unwrap().push(row.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn collector_with(initial_wait: Duration, scroll_pause: Duration, max_scroll_attempts: u32) -> FeedCollector {
    FeedCollector::new(CollectorConfig {
        profile_url: BASE.to_string(),
        max_scroll_attempts,
        scroll_step_px: 800,
        scroll_pause,
        initial_wait,
        origin_tz: Tz::Asia__Seoul,
        target_tz: Tz::America__New_York,
    })
    .unwrap()
}

fn pipeline(launcher: FixedLauncher, storage: Storage) -> Pipeline {
    pipeline_with(launcher, storage, collector_with(Duration::ZERO, Duration::ZERO, 3))
}

fn pipeline_with(launcher: FixedLauncher, storage: Storage, collector: FeedCollector) -> Pipeline {
    let llm: DynLlmClient = Arc::new(ScriptedLlm);
    Pipeline::new(
        Arc::new(launcher),
        collector,
        ImpactClassifier::new(llm.clone()),
        ReportGenerator::new(llm, "Korean"),
        storage,
        NotifierMux::default(),
        10,
    )
}

#[tokio::test]
async fn cycle_classifies_stores_and_reports_new_posts() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("posts_scraped.csv");
    let results = dir.path().join("posts_analysis.csv");

    // Seed: post A is already known.
    Storage::new(None, raw.clone(), results.clone()).save_raw_posts(&[Post {
        url: url("A"),
        time_str: "Nov 11, 2025, 09:30 AM".into(),
        time: "2025-11-10 19:30:00".into(),
        content: "Old post".into(),
        clean_content: "old post".into(),
    }]);

    let html = page(&[
        ("C", "Nvidia is investing billions in America!"),
        ("D", "RT @someone: great rally"),
        ("E", "Happy Thanksgiving to all"),
        ("A", "Old post"),
    ]);
    let closed = Arc::new(AtomicUsize::new(0));
    let primary = Arc::new(MemoryStore::default());
    let p = pipeline(
        FixedLauncher {
            html: Some(html),
            closed: closed.clone(),
        },
        Storage::new(Some(primary.clone()), raw.clone(), results.clone()),
    );

    let summary = p.run_cycle().await.unwrap();
    assert_eq!(
        summary,
        CycleSummary {
            collected: 3,
            skipped: 1,
            classified: 2,
            classifier_fallbacks: 0,
            stored: 2,
            reports: 1,
            report_fallbacks: 0,
        }
    );
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let stored: Vec<PostRow> = read_rows(&results).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].url, url("C"));
    assert_eq!(stored[0].impact_on_market, "Direct");
    assert_eq!(stored[0].time, "2025-11-11 19:30:00");

    let reports = primary.reports.lock().unwrap().clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, 1);
    assert_eq!(reports[0].stock, "NVDA");
    assert!((reports[0].model - 9.0).abs() < 1e-9);
    assert_eq!(reports[0].time_str, "Nov 12, 2025, 09:30 AM");

    // The raw backup now knows C, so the next cycle finds nothing new.
    let again = p.run_cycle().await.unwrap();
    assert_eq!(again.collected, 0);
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn browser_failure_is_an_empty_cycle() {
    let dir = tempdir().unwrap();
    let p = pipeline(
        FixedLauncher {
            html: None,
            closed: Arc::new(AtomicUsize::new(0)),
        },
        Storage::new(
            None,
            dir.path().join("posts_scraped.csv"),
            dir.path().join("posts_analysis.csv"),
        ),
    );

    let summary = p.run_cycle().await.unwrap();
    assert_eq!(summary, CycleSummary::default());
    assert!(!dir.path().join("posts_analysis.csv").exists());
}

#[tokio::test]
async fn without_primary_store_results_go_to_the_mirror_only() {
    let dir = tempdir().unwrap();
    let results = dir.path().join("posts_analysis.csv");
    let p = pipeline(
        FixedLauncher {
            html: Some(page(&[("N", "Nvidia is investing billions in America!")])),
            closed: Arc::new(AtomicUsize::new(0)),
        },
        Storage::new(None, dir.path().join("posts_scraped.csv"), results.clone()),
    );

    let summary = p.run_cycle().await.unwrap();
    assert_eq!(summary.classified, 1);
    assert_eq!(summary.stored, 0);
    assert_eq!(summary.reports, 0, "no stored id means no report");
    assert_eq!(read_rows::<PostRow>(&results).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn ctrl_c_mid_collection_closes_the_browser() {
    let dir = tempdir().unwrap();
    let closed = Arc::new(AtomicUsize::new(0));
    let p = pipeline_with(
        FixedLauncher {
            html: Some(page(&[("Z", "Markets are open")])),
            closed: closed.clone(),
        },
        Storage::new(
            None,
            dir.path().join("posts_scraped.csv"),
            dir.path().join("posts_analysis.csv"),
        ),
        collector_with(Duration::from_secs(4), Duration::from_secs(2), 100),
    );
    let scheduler = IntervalScheduler::new(IntervalSchedulerCfg {
        interval: Duration::from_secs(60),
        error_backoff: Duration::from_secs(30),
    });

    // Shutdown fires while the collector is still scrolling.
    let stats = scheduler
        .run_until(&p, tokio::time::sleep(Duration::from_secs(10)))
        .await;

    assert_eq!(stats, RunStats::default());
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("posts_scraped.csv").exists());
}
