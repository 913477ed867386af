// src/analyze/classifier.rs
//! Impact classifier: one prompt per post, strict six-key JSON answer.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ai_adapter::DynLlmClient;
use super::{extract_json_block, string_or_list, Analysis};

pub const MAX_KEYWORDS: usize = 5;

/// The closed sector vocabulary the classifier chooses from.
pub const SECTORS: [&str; 11] = [
    "Financials",
    "Information Technology",
    "Health Care",
    "Consumer Discretionary",
    "Communication Services",
    "Industrials",
    "Consumer Staples",
    "Energy",
    "Real Estate",
    "Materials",
    "Utilities",
];

const INSTRUCTIONS: &str = "You are an expert who analyzes Donald Trump's posts for economic and stock market implications. \
For each post, respond only according to the instructions below.\n\n\
Instructions:\n\
1) impact_on_market: 'Direct' if specific companies or CEOs are mentioned, 'Indirect' if it affects sectors or economy, 'No' if not impactful.\n\
2) sentiment_score: a float between -1.0 (strongly negative) and 1.0 (strongly positive) with one decimal place.\n\
3) market_impact_score: a float between 0.0 (no market impact) and 1.0 (very strong market impact).\n\
4) keywords: list up to 5 main companies, CEOs, or economic terms in order of importance.\n\
5) sector: list all applicable sectors affected by the post, choose from [Financials, Information Technology, Health Care, Consumer Discretionary, Communication Services, Industrials, Consumer Staples, Energy, Real Estate, Materials, Utilities]. \
If a specific company is mentioned, include the company name.\n\
6) reason: one concise English sentence explaining your reason about market impact. \
If impact_on_market is 'Direct', end the reason with a final sentence that lists only the affected U.S. ticker symbols, comma-separated (for example: 'NVDA, AMD.').\n\n\
Respond strictly in valid JSON format with these exact keys: impact_on_market, sentiment_score, market_impact_score, keywords, sector, reason.\n\
Do not include any markdown formatting or code blocks.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ImpactCategory {
    Direct,
    Indirect,
    No,
    Error,
}

impl ImpactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactCategory::Direct => "Direct",
            ImpactCategory::Indirect => "Indirect",
            ImpactCategory::No => "No",
            ImpactCategory::Error => "Error",
        }
    }
}

impl fmt::Display for ImpactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ImpactCategory {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ImpactCategory::Direct),
            "indirect" => Ok(ImpactCategory::Indirect),
            "no" => Ok(ImpactCategory::No),
            "error" => Ok(ImpactCategory::Error),
            _ => Err(format!("unknown impact_on_market value: {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub impact_on_market: ImpactCategory,
    pub sentiment_score: f64,
    pub market_impact_score: f64,
    #[serde(deserialize_with = "string_or_list")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub sector: Vec<String>,
    pub reason: String,
}

impl Classification {
    /// Sentinel stored when classification failed.
    pub fn error(message: &str) -> Self {
        Self {
            impact_on_market: ImpactCategory::Error,
            sentiment_score: 0.0,
            market_impact_score: 0.0,
            keywords: Vec::new(),
            sector: Vec::new(),
            reason: format!("Analysis error: {message}"),
        }
    }

    /// Parse a raw model answer (fenced or not) and clamp it into range.
    pub fn parse(response: &str) -> Result<Self> {
        let json = extract_json_block(response);
        if json.is_empty() {
            return Err(anyhow!("empty model response"));
        }
        let mut c: Classification =
            serde_json::from_str(json).context("classification JSON")?;
        c.sentiment_score = clamp_score(c.sentiment_score, -1.0, 1.0);
        c.market_impact_score = clamp_score(c.market_impact_score, 0.0, 1.0);
        c.keywords.truncate(MAX_KEYWORDS);
        c.reason = c.reason.trim().to_string();
        Ok(c)
    }
}

fn clamp_score(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(lo, hi)
}

pub struct ImpactClassifier {
    llm: DynLlmClient,
}

impl ImpactClassifier {
    pub fn new(llm: DynLlmClient) -> Self {
        Self { llm }
    }

    /// Single attempt; every failure turns into the Error sentinel.
    pub async fn analyze(&self, text: &str) -> Analysis<Classification> {
        counter!("classifier_calls_total").increment(1);
        tracing::info!(preview = %preview(text, 50), provider = self.llm.provider_name(), "classifying post");

        match self.try_analyze(text).await {
            Ok(c) => {
                tracing::info!(
                    impact = %c.impact_on_market,
                    score = c.market_impact_score,
                    "classification done"
                );
                Analysis::Ready(c)
            }
            Err(e) => {
                let error = format!("{e:#}");
                counter!("classifier_fallback_total").increment(1);
                tracing::warn!(error = %error, "classification failed, storing error sentinel");
                Analysis::Fallback {
                    value: Classification::error(&error),
                    error,
                }
            }
        }
    }

    async fn try_analyze(&self, text: &str) -> Result<Classification> {
        let response = self.llm.complete(INSTRUCTIONS, text).await?;
        Classification::parse(&response)
    }
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
