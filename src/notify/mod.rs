pub mod desktop;
pub mod discord;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::NotifyConfig;

/// "New posts found" event, sent before classification starts.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub new_posts: usize,
    pub newest_url: Option<String>,
    pub ts: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new_posts(count: usize, newest_url: Option<String>) -> Self {
        Self {
            new_posts: count,
            newest_url,
            ts: Utc::now(),
        }
    }

    pub fn title(&self) -> &'static str {
        "New Trump posts found"
    }

    pub fn message(&self) -> String {
        format!(
            "{} new post(s) found. Starting AI analysis.",
            self.new_posts
        )
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one event out to every configured notifier. Failures are logged only.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = Vec::new();
        if cfg.desktop {
            sinks.push(Box::new(desktop::DesktopNotifier::new()));
        }
        if let Some(hook) = cfg.discord_webhook_url.as_deref().filter(|h| !h.is_empty()) {
            sinks.push(Box::new(discord::DiscordNotifier::new(hook.to_string())));
        }
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(ev).await {
                tracing::warn!(error = ?e, notifier = sink.name(), "notification failed");
            }
        }
    }
}
