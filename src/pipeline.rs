//! # Pipeline
//! One polling cycle: collect → normalize/filter → classify → persist →
//! report (eligible posts only) → persist report.
//!
//! Posts are handled one at a time. External failures degrade to empty
//! collections or fallback records inside the cycle; only truly unexpected
//! errors reach the scheduler.

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analyze::ai_adapter::{build_client_from_config, DynLlmClient};
use crate::analyze::{is_report_eligible, Classification, ImpactClassifier, ReportGenerator};
use crate::config::AppConfig;
use crate::ingest::browser::{BrowserLauncher, BrowserSession, WebDriverLauncher};
use crate::ingest::collector::{CollectorConfig, FeedCollector};
use crate::ingest::is_valid_post;
use crate::ingest::scheduler::Cycle;
use crate::ingest::types::Post;
use crate::notify::{NotificationEvent, NotifierMux};
use crate::store::{PostRow, Storage};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub collected: usize,
    pub skipped: usize,
    pub classified: usize,
    pub classifier_fallbacks: usize,
    pub stored: usize,
    pub reports: usize,
    pub report_fallbacks: usize,
}

pub struct Pipeline {
    launcher: Arc<dyn BrowserLauncher>,
    collector: FeedCollector,
    classifier: ImpactClassifier,
    reporter: ReportGenerator,
    storage: Storage,
    notifier: NotifierMux,
    max_posts: usize,
    /// Session of the running cycle; taken back by `shutdown` if the cycle is cancelled.
    session: Mutex<Option<Box<dyn BrowserSession>>>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        collector: FeedCollector,
        classifier: ImpactClassifier,
        reporter: ReportGenerator,
        storage: Storage,
        notifier: NotifierMux,
        max_posts: usize,
    ) -> Self {
        Self {
            launcher,
            collector,
            classifier,
            reporter,
            storage,
            notifier,
            max_posts,
            session: Mutex::new(None),
        }
    }

    /// Wire every component from resolved configuration.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let launcher = WebDriverLauncher::new(
            &cfg.scraper.webdriver_url,
            &cfg.scraper.user_agent,
            cfg.scraper.headless,
        )?;
        let collector = FeedCollector::new(CollectorConfig::from_scraper(&cfg.scraper)?)?;
        let llm: DynLlmClient = build_client_from_config(&cfg.ai)?;
        tracing::info!(provider = llm.provider_name(), model = %cfg.ai.model, "LLM client ready");

        Ok(Self::new(
            Arc::new(launcher),
            collector,
            ImpactClassifier::new(llm.clone()),
            ReportGenerator::new(llm, &cfg.ai.report_language),
            Storage::from_config(&cfg.store)?,
            NotifierMux::from_config(&cfg.notify),
            cfg.scraper.max_posts_per_cycle,
        ))
    }

    /// Browser failures end the collection with nothing; the next cycle retries.
    async fn collect(&self, known: &HashSet<String>) -> Vec<Post> {
        let session = match self.launcher.launch().await {
            Ok(s) => s,
            Err(e) => {
                counter!("collector_errors_total").increment(1);
                tracing::warn!(error = ?e, "browser launch failed");
                return Vec::new();
            }
        };

        let mut slot = self.session.lock().await;
        let active = slot.insert(session);
        let result = self
            .collector
            .collect_new_posts(&mut **active, known, self.max_posts)
            .await;
        if let Some(session) = slot.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = ?e, "browser session close failed");
            }
        }

        match result {
            Ok(posts) => posts,
            Err(e) => {
                counter!("collector_errors_total").increment(1);
                tracing::warn!(error = ?e, "feed collection failed");
                Vec::new()
            }
        }
    }

    async fn classify_all(&self, posts: Vec<Post>, summary: &mut CycleSummary) -> Vec<(Post, Classification)> {
        let total = posts.len();
        let mut analyzed = Vec::with_capacity(total);
        for (i, post) in posts.into_iter().enumerate() {
            if !is_valid_post(&post.clean_content) {
                summary.skipped += 1;
                counter!("posts_skipped_total").increment(1);
                tracing::info!(url = %post.url, "skipping repost or empty post");
                continue;
            }
            tracing::info!(index = i + 1, total, url = %post.url, "analyzing post");
            let outcome = self.classifier.analyze(&post.clean_content).await;
            if outcome.is_fallback() {
                summary.classifier_fallbacks += 1;
            }
            analyzed.push((post, outcome.into_value()));
        }
        summary.classified = analyzed.len();
        analyzed
    }
}

#[async_trait]
impl Cycle for Pipeline {
    type Summary = CycleSummary;

    async fn run_cycle(&self) -> Result<CycleSummary> {
        let known = self.storage.existing_urls();
        tracing::debug!(known = known.len(), "dedup seed loaded");

        let posts = self.collect(&known).await;
        let mut summary = CycleSummary {
            collected: posts.len(),
            ..CycleSummary::default()
        };
        if posts.is_empty() {
            tracing::info!("no new posts");
            return Ok(summary);
        }
        tracing::info!(count = posts.len(), "new posts found");

        self.storage.save_raw_posts(&posts);
        self.notifier
            .notify(&NotificationEvent::new_posts(
                posts.len(),
                posts.first().map(|p| p.url.clone()),
            ))
            .await;

        let analyzed = self.classify_all(posts, &mut summary).await;
        let rows: Vec<PostRow> = analyzed.iter().map(|(p, c)| PostRow::new(p, c)).collect();
        let ids = self.storage.save_results(&rows).await;
        summary.stored = ids.len();

        for (post, classification) in &analyzed {
            let Some(&id) = ids.get(&post.url) else {
                if is_report_eligible(classification) {
                    tracing::warn!(url = %post.url, "eligible post has no stored id; report skipped");
                }
                continue;
            };
            let Some(report) = self
                .reporter
                .maybe_generate(classification, &post.clean_content)
                .await
            else {
                continue;
            };
            summary.reports += 1;
            if report.is_fallback() {
                summary.report_fallbacks += 1;
            }
            self.storage
                .save_report(id, report.value(), &post.time_str)
                .await;
        }

        Ok(summary)
    }

    async fn shutdown(&self) {
        if let Some(session) = self.session.lock().await.take() {
            tracing::info!("closing browser session left by a cancelled cycle");
            if let Err(e) = session.close().await {
                tracing::warn!(error = ?e, "browser session close failed");
            }
        }
    }
}
