// src/config/ai.rs
use serde::{Deserialize, Serialize};

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-5-nano".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_report_language() -> String {
    "Korean".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Language for report title/forecast/summary.
    #[serde(default = "default_report_language")]
    pub report_language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            report_language: default_report_language(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    /// Resolve "ENV" placeholders and env overrides, then validate.
    pub fn resolve<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Normalize provider
        self.provider = self.provider.trim().to_lowercase();

        if lookup("AI_TEST_MODE").is_some_and(|v| v == "mock") {
            self.provider = "mock".to_string();
        }
        if let Some(model) = lookup("OPENAI_MODEL_NAME").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }

        match self.provider.as_str() {
            "mock" => {}
            "openai" => {
                if self.api_key.trim().eq_ignore_ascii_case("env") || self.api_key.is_empty() {
                    self.api_key = lookup("OPENAI_API_KEY")
                        .filter(|k| !k.trim().is_empty())
                        .ok_or_else(|| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?;
                }
            }
            other => anyhow::bail!("Unsupported AI provider in config: {other}"),
        }

        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }

        Ok(self)
    }
}
