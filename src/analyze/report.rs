// src/analyze/report.rs
//! Secondary investment report for high-impact posts.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ai_adapter::DynLlmClient;
use super::classifier::{Classification, ImpactCategory};
use super::{extract_json_block, string_or_list, Analysis};

pub const REPORT_MIN_IMPACT: f64 = 0.5;
pub const MAX_TITLE_CHARS: usize = 50;
pub const FORECAST_SENTENCES: usize = 3;
pub const MAX_TICKERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub forecast: String,
    #[serde(rename = "posts")]
    pub summary: String,
    /// Always `market_impact_score * 10`, computed locally.
    #[serde(default, skip_deserializing)]
    pub model: f64,
    #[serde(default, deserialize_with = "string_or_list")]
    pub stock: Vec<String>,
}

impl Report {
    fn placeholder(model: f64, error: &str) -> Self {
        let sentence = "An error occurred while generating the report.";
        Self {
            title: "Report generation failed".to_string(),
            forecast: [sentence; FORECAST_SENTENCES].join(" "),
            summary: format!("Post analysis error: {error}"),
            model,
            stock: Vec::new(),
        }
    }

    /// Parse a raw model answer and enforce field bounds.
    pub fn parse(response: &str, model: f64) -> Result<Self> {
        let json = extract_json_block(response);
        if json.is_empty() {
            return Err(anyhow!("empty model response"));
        }
        let mut report: Report = serde_json::from_str(json).context("report JSON")?;
        report.title = report.title.trim().chars().take(MAX_TITLE_CHARS).collect();
        report.forecast = first_sentences(report.forecast.trim(), FORECAST_SENTENCES);
        report.summary = report.summary.trim().to_string();
        report.model = model;
        report.stock = report
            .stock
            .into_iter()
            .map(|s| s.to_ascii_uppercase())
            .take(MAX_TICKERS)
            .collect();
        Ok(report)
    }
}

fn re_ticker_list() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{1,5}(\s*,\s*[A-Z]{1,5})*$").unwrap())
}

/// Direct impact, score ≥ 0.5, and a reason whose last sentence is a bare
/// comma-separated ticker list such as `NVDA, AMD.`
pub fn is_report_eligible(c: &Classification) -> bool {
    if c.impact_on_market != ImpactCategory::Direct || c.market_impact_score < REPORT_MIN_IMPACT {
        return false;
    }
    c.reason
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last()
        .is_some_and(|last| re_ticker_list().is_match(last))
}

/// Keeps at most `n` sentences. A terminator only ends a sentence when it is
/// followed by whitespace or the end of text, so `3.5%` stays intact.
fn first_sentences(text: &str, n: usize) -> String {
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                count += 1;
                if count == n {
                    return text[..i + ch.len_utf8()].to_string();
                }
            }
        }
    }
    text.to_string()
}

pub struct ReportGenerator {
    llm: DynLlmClient,
    language: String,
}

impl ReportGenerator {
    pub fn new(llm: DynLlmClient, language: &str) -> Self {
        Self {
            llm,
            language: language.to_string(),
        }
    }

    /// Runs the report prompt only for eligible classifications.
    pub async fn maybe_generate(
        &self,
        classification: &Classification,
        text: &str,
    ) -> Option<Analysis<Report>> {
        if !is_report_eligible(classification) {
            return None;
        }
        Some(self.generate(classification, text).await)
    }

    pub async fn generate(&self, classification: &Classification, text: &str) -> Analysis<Report> {
        let model = classification.market_impact_score * 10.0;
        tracing::info!(model, "generating report");

        match self.try_generate(classification, text, model).await {
            Ok(report) => {
                counter!("reports_generated_total").increment(1);
                tracing::info!(title = %report.title, tickers = ?report.stock, "report ready");
                Analysis::Ready(report)
            }
            Err(e) => {
                let error = format!("{e:#}");
                counter!("report_fallback_total").increment(1);
                tracing::warn!(error = %error, "report generation failed, storing placeholder");
                Analysis::Fallback {
                    value: Report::placeholder(model, &error),
                    error,
                }
            }
        }
    }

    async fn try_generate(
        &self,
        classification: &Classification,
        text: &str,
        model: f64,
    ) -> Result<Report> {
        let instructions = self.instructions();
        let input = report_input(classification, text, model);
        let response = self.llm.complete(&instructions, &input).await?;
        Report::parse(&response, model)
    }

    fn instructions(&self) -> String {
        let lang = &self.language;
        format!(
            "You are an expert analyst specializing in U.S. stock markets and financial news. \
You analyze Donald Trump's posts that have direct market impact and create professional investment reports.\n\n\
Instructions:\n\
1) title: Create a concise, professional {lang} title for the report that captures the main market impact (maximum {MAX_TITLE_CHARS} characters).\n\
2) forecast: Write EXACTLY {FORECAST_SENTENCES} sentences in {lang} predicting the future market impact of this post. \
Provide specific analysis on how this will affect the market, sectors, and related stocks.\n\
3) posts: Provide a {lang} summary (2-3 sentences) highlighting the core message of the post that is most relevant to investors.\n\
4) model: This will be provided as input (market_impact_score * 10). Just return this value as-is.\n\
5) stock: List up to {MAX_TICKERS} U.S. stock ticker symbols (e.g., NVDA, TSM, AMD) that will be most affected by this post. \
Use only valid NYSE/NASDAQ ticker symbols, separated by commas with no spaces.\n\n\
CRITICAL RULES:\n\
- forecast MUST be EXACTLY {FORECAST_SENTENCES} sentences, no more, no less\n\
- Stock tickers must be real, valid U.S. exchange symbols\n\
- Respond strictly in valid JSON format with no extra text\n"
        )
    }
}

fn report_input(c: &Classification, text: &str, model: f64) -> String {
    format!(
        "Analyze the following Trump post and its market analysis:\n\n\
Post Content: {text}\n\n\
Analysis Results:\n\
- Impact on Market: {}\n\
- Sentiment Score: {}\n\
- Market Impact Score: {}\n\
- Keywords: {}\n\
- Sector: {}\n\
- Reason: {}\n\n\
Model Score (market_impact_score * 10): {model}\n\n\
Generate a professional investment report in JSON format.\n",
        c.impact_on_market,
        c.sentiment_score,
        c.market_impact_score,
        c.keywords.join(", "),
        c.sector.join(", "),
        c.reason,
    )
}
