// tests/ingest_dedup.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::time::Duration;

use trump_post_analyzer::ingest::browser::BrowserSession;
use trump_post_analyzer::ingest::collector::{
    scan_blocks, CollectorConfig, FeedCollector, PostBlock, ScanState, ScanStop,
};

const BASE: &str = "https://truthsocial.com/@realDonaldTrump";

fn cfg() -> CollectorConfig {
    CollectorConfig {
        profile_url: BASE.to_string(),
        max_scroll_attempts: 5,
        scroll_step_px: 800,
        scroll_pause: Duration::ZERO,
        initial_wait: Duration::ZERO,
        origin_tz: Tz::Asia__Seoul,
        target_tz: Tz::America__New_York,
    }
}

fn url(id: &str) -> String {
    format!("{BASE}/{id}")
}

fn block(id: &str) -> PostBlock {
    PostBlock {
        url: Some(url(id)),
        is_repost: false,
        text: format!("Post {id} about tariffs"),
        timestamp_raw: Some("Nov 12, 2025, 09:30 AM".into()),
    }
}

#[test]
fn stops_at_first_known_url() {
    let known: HashSet<String> = [url("A"), url("B")].into_iter().collect();
    let mut state = ScanState::default();

    let stop = scan_blocks(
        vec![block("C"), block("B"), block("D")],
        &known,
        10,
        &cfg(),
        &mut state,
    );

    assert_eq!(stop, Some(ScanStop::KnownReached));
    let urls: Vec<_> = state.collected.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec![url("C")]);
    assert_eq!(state.collected[0].time, "2025-11-11 19:30:00");
    assert_eq!(state.collected[0].clean_content, "post about tariffs");
}

#[test]
fn respects_max_count_and_skips_reposts() {
    let mut repost = block("R");
    repost.is_repost = true;
    let mut no_url = block("X");
    no_url.url = None;

    let mut state = ScanState::default();
    let stop = scan_blocks(
        vec![no_url, repost, block("1"), block("2"), block("3")],
        &HashSet::new(),
        2,
        &cfg(),
        &mut state,
    );

    assert_eq!(stop, Some(ScanStop::Full));
    let urls: Vec<_> = state.collected.iter().map(|p| p.url.clone()).collect();
    assert_eq!(urls, vec![url("1"), url("2")]);
}

#[test]
fn blocks_seen_in_an_earlier_pass_are_not_repeated() {
    let mut state = ScanState::default();
    let known = HashSet::new();

    assert_eq!(scan_blocks(vec![block("1"), block("2")], &known, 10, &cfg(), &mut state), None);
    // Second pass after scrolling re-renders the same top posts.
    assert_eq!(
        scan_blocks(vec![block("1"), block("2"), block("3")], &known, 10, &cfg(), &mut state),
        None
    );
    assert_eq!(state.collected.len(), 3);
}

/// Serves a fixed sequence of pages, one per `page_source` call.
struct ScriptedSession {
    pages: Vec<String>,
    reads: usize,
    scrolls: usize,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn render(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn scroll_by(&mut self, _px: u32) -> Result<()> {
        self.scrolls += 1;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String> {
        let idx = self.reads.min(self.pages.len() - 1);
        self.reads += 1;
        Ok(self.pages[idx].clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn page(ids: &[&str]) -> String {
    let mut html = String::from("<html><body>");
    for (i, id) in ids.iter().enumerate() {
        html.push_str(&format!(
            r#"<div data-index="{i}"><a href="/@realDonaldTrump/{id}"><time title="Nov 12, 2025, 09:30 AM">1h</time></a>
               <div data-testid="status-content"><p>Post {id} about the economy</p></div></div>"#
        ));
    }
    html.push_str("</body></html>");
    html
}

#[tokio::test]
async fn scrolls_until_a_known_post_appears() {
    let collector = FeedCollector::new(cfg()).unwrap();
    let mut session = ScriptedSession {
        pages: vec![page(&["C", "D"]), page(&["C", "D", "E", "B", "A"])],
        reads: 0,
        scrolls: 0,
    };
    let known: HashSet<String> = [url("A"), url("B")].into_iter().collect();

    let posts = collector
        .collect_new_posts(&mut session, &known, 10)
        .await
        .unwrap();

    let urls: Vec<_> = posts.iter().map(|p| p.url.clone()).collect();
    assert_eq!(urls, vec![url("C"), url("D"), url("E")]);
    assert_eq!(session.scrolls, 1);
}

#[tokio::test]
async fn gives_up_after_scroll_budget() {
    let collector = FeedCollector::new(cfg()).unwrap();
    let mut session = ScriptedSession {
        pages: vec![page(&["C"])],
        reads: 0,
        scrolls: 0,
    };

    let posts = collector
        .collect_new_posts(&mut session, &HashSet::new(), 10)
        .await
        .unwrap();

    assert_eq!(posts.len(), 1);
    assert_eq!(session.reads, 5);
}
