// src/ingest/collector.rs
//! Feed collector: scrolls the profile page and returns posts newer than the
//! newest already-known URL, newest first.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::time::Duration;

use super::browser::BrowserSession;
use super::normalize_post_text;
use super::timestamp::convert_source_timestamp;
use super::types::{Post, TIMESTAMP_UNAVAILABLE};
use crate::config::ScraperConfig;

static SEL_STATUS_CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[data-testid="status-content"]"#).unwrap());
static SEL_TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time").unwrap());
static SEL_STATUS_INFO: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[role="status-info"]"#).unwrap());

const REPOST_MARKER: &str = "ReTruthed";

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub profile_url: String,
    pub max_scroll_attempts: u32,
    pub scroll_step_px: u32,
    pub scroll_pause: Duration,
    pub initial_wait: Duration,
    pub origin_tz: Tz,
    pub target_tz: Tz,
}

impl CollectorConfig {
    pub fn from_scraper(cfg: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            profile_url: cfg.profile_url.clone(),
            max_scroll_attempts: cfg.max_scroll_attempts,
            scroll_step_px: cfg.scroll_step_px,
            scroll_pause: Duration::from_millis(cfg.scroll_pause_ms),
            initial_wait: Duration::from_millis(cfg.initial_wait_ms),
            origin_tz: cfg.origin_tz()?,
            target_tz: cfg.target_tz()?,
        })
    }
}

/// One post block as found in the rendered markup, before dedup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBlock {
    pub url: Option<String>,
    pub is_repost: bool,
    pub text: String,
    pub timestamp_raw: Option<String>,
}

/// Why a scan pass ended the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStop {
    KnownReached,
    Full,
}

/// State carried across scroll passes of one collection.
#[derive(Debug, Default)]
pub struct ScanState {
    seen: HashSet<String>,
    pub collected: Vec<Post>,
}

pub struct FeedCollector {
    cfg: CollectorConfig,
    base: Url,
}

impl FeedCollector {
    pub fn new(cfg: CollectorConfig) -> Result<Self> {
        let base = Url::parse(&cfg.profile_url)
            .with_context(|| format!("invalid profile url {}", cfg.profile_url))?;
        Ok(Self { cfg, base })
    }

    /// Scrolls until a known URL shows up, `max_count` posts are collected or
    /// the scroll budget runs out.
    pub async fn collect_new_posts(
        &self,
        session: &mut dyn BrowserSession,
        known_urls: &HashSet<String>,
        max_count: usize,
    ) -> Result<Vec<Post>> {
        let t0 = std::time::Instant::now();
        session
            .render(&self.cfg.profile_url)
            .await
            .context("rendering profile page")?;
        tokio::time::sleep(self.cfg.initial_wait).await;

        let mut state = ScanState::default();
        for attempt in 0..self.cfg.max_scroll_attempts {
            let html = session.page_source().await.context("reading page source")?;
            let blocks = extract_blocks(&html, &self.base);

            if let Some(stop) = scan_blocks(blocks, known_urls, max_count, &self.cfg, &mut state) {
                match stop {
                    ScanStop::KnownReached => {
                        tracing::info!(attempt, collected = state.collected.len(), "reached known post, stopping scroll")
                    }
                    ScanStop::Full => {
                        tracing::info!(attempt, collected = state.collected.len(), "collection limit reached")
                    }
                }
                break;
            }

            session
                .scroll_by(self.cfg.scroll_step_px)
                .await
                .context("scrolling feed")?;
            tokio::time::sleep(self.cfg.scroll_pause).await;
        }

        histogram!("collector_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("posts_collected_total").increment(state.collected.len() as u64);
        Ok(state.collected)
    }
}

/// Applies dedup and stop rules to one pass worth of blocks.
/// Returns `Some` when the collection is finished.
pub fn scan_blocks(
    blocks: Vec<PostBlock>,
    known_urls: &HashSet<String>,
    max_count: usize,
    cfg: &CollectorConfig,
    state: &mut ScanState,
) -> Option<ScanStop> {
    for block in blocks {
        let Some(url) = block.url else {
            continue;
        };
        if !state.seen.insert(url.clone()) {
            continue;
        }
        if known_urls.contains(&url) {
            return Some(ScanStop::KnownReached);
        }
        if block.is_repost || block.text.is_empty() {
            continue;
        }

        let time_str = block
            .timestamp_raw
            .unwrap_or_else(|| TIMESTAMP_UNAVAILABLE.to_string());
        let time = convert_source_timestamp(&time_str, cfg.origin_tz, cfg.target_tz);
        let clean_content = normalize_post_text(Some(&block.text));

        state.collected.push(Post {
            url,
            time_str,
            time,
            content: block.text,
            clean_content,
        });
        tracing::debug!(collected = state.collected.len(), "collected post");

        if state.collected.len() >= max_count {
            return Some(ScanStop::Full);
        }
    }
    None
}

/// Pulls post blocks out of rendered profile markup, in document order.
pub fn extract_blocks(html: &str, base: &Url) -> Vec<PostBlock> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for post in doc.select(&SEL_STATUS_CONTENT) {
        let Some(container) = post
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "div" && a.value().attr("data-index").is_some())
        else {
            continue;
        };

        let time_tag = container.select(&SEL_TIME).next();
        let url = time_tag
            .and_then(|t| {
                t.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
            })
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(|u| u.to_string());

        let is_repost = container
            .select(&SEL_STATUS_INFO)
            .next()
            .is_some_and(|info| info.text().collect::<String>().contains(REPOST_MARKER));

        let timestamp_raw = time_tag
            .and_then(|t| t.value().attr("title"))
            .map(str::to_string);

        out.push(PostBlock {
            url,
            is_repost,
            text: block_text(post),
            timestamp_raw,
        });
    }
    out
}

/// Text of a post body: `<br>` becomes a newline, text nodes are trimmed and
/// joined with single spaces.
fn block_text(post: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in post.descendants() {
        match node.value() {
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Text(t) => {
                let piece = t.trim();
                if piece.is_empty() {
                    continue;
                }
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push(' ');
                }
                out.push_str(piece);
            }
            _ => {}
        }
    }
    out.trim().to_string()
}
