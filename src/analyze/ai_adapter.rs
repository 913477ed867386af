//! AI adapter: the LLM request/response boundary.
//!
//! One call takes fixed instructions plus an input text and returns the raw
//! model output. Parsing lives with the callers.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one prompt. `instructions` is the system message, `input` the user message.
    async fn complete(&self, instructions: &str, input: &str) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: build a client according to resolved config.
///
/// * `provider = "mock"` returns a client that answers with a neutral classification.
/// * `provider = "openai"` builds the Chat Completions client.
pub fn build_client_from_config(config: &AiConfig) -> Result<DynLlmClient> {
    match config.provider.as_str() {
        "mock" => Ok(Arc::new(MockProvider::new(MOCK_RESPONSE))),
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            &config.api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )?)),
        other => Err(anyhow!("Unsupported AI provider: {other}")),
    }
}

const MOCK_RESPONSE: &str = r#"{"impact_on_market":"No","sentiment_score":0.0,"market_impact_score":0.0,"keywords":[],"sector":[],"reason":"Mock provider response."}"#;

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// OpenAI provider (uses Chat Completions API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("trump-post-analyzer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiProvider {
    async fn complete(&self, instructions: &str, input: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: instructions,
                },
                Msg {
                    role: "user",
                    content: input,
                },
            ],
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("openai HTTP {}: {}", status.as_u16(), truncate(&body, 300)));
        }
        let body: Resp = resp.json().await.context("openai response body")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("openai returned no content"))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Simple mock provider for tests/local runs: returns a fixed answer.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

impl MockProvider {
    pub fn new(fixed: &str) -> Self {
        Self {
            fixed: fixed.to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for MockProvider {
    async fn complete(&self, _instructions: &str, _input: &str) -> Result<String> {
        Ok(self.fixed.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
