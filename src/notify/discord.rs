use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{NotificationEvent, Notifier};

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    fn payload(ev: &NotificationEvent) -> DiscordWebhookPayload {
        let link = ev.newest_url.as_deref().unwrap_or("-");
        let description = format!(
            "{}\n**Newest:** {}\n**Time (UTC):** {}",
            ev.message(),
            link,
            ev.ts.to_rfc3339()
        );
        DiscordWebhookPayload::embed(ev.title(), &description)
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let payload = Self::payload(ev);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordWebhookPayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.to_string(),
                description: description.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_mentions_count_and_link() {
        let ev = NotificationEvent::new_posts(4, Some("https://truthsocial.com/@x/1".into()));
        let json = serde_json::to_value(DiscordNotifier::payload(&ev)).unwrap();
        let desc = json["embeds"][0]["description"].as_str().unwrap();
        assert!(desc.starts_with("4 new post(s)"));
        assert!(desc.contains("https://truthsocial.com/@x/1"));
        assert!(json["content"].is_null());
    }

    #[tokio::test]
    async fn unreachable_webhook_errors_after_retries() {
        let n = DiscordNotifier {
            timeout: Duration::from_secs(1),
            max_retries: 1,
            ..DiscordNotifier::new("http://127.0.0.1:9/hook".into())
        };
        assert!(n.send(&NotificationEvent::new_posts(1, None)).await.is_err());
    }
}
