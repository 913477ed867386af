// src/analyze/mod.rs
//! Model-backed analysis: impact classification and report generation.

pub mod ai_adapter;
pub mod classifier;
pub mod report;

use serde::{Deserialize, Deserializer};

pub use classifier::{Classification, ImpactCategory, ImpactClassifier};
pub use report::{is_report_eligible, Report, ReportGenerator};

/// Outcome of a model-backed step that never fails outright.
///
/// `Fallback` carries the placeholder value that is persisted in place of a
/// real answer, plus the error that caused it.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<T> {
    Ready(T),
    Fallback { value: T, error: String },
}

impl<T> Analysis<T> {
    pub fn value(&self) -> &T {
        match self {
            Analysis::Ready(v) => v,
            Analysis::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Analysis::Ready(v) => v,
            Analysis::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Analysis::Fallback { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Analysis::Ready(_) => None,
            Analysis::Fallback { error, .. } => Some(error),
        }
    }
}

/// Strips a Markdown code fence around a JSON answer.
/// A ```json fence wins over a bare ``` fence; unfenced text is only trimmed.
pub fn extract_json_block(response: &str) -> &str {
    if let Some((_, rest)) = response.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut parts = response.split("```");
    match (parts.next(), parts.next()) {
        (Some(_), Some(inner)) => inner.trim(),
        _ => response.trim(),
    }
}

/// Accepts either `["a", "b"]` or `"a, b"` for list-valued fields.
pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::List(v) => v,
        Raw::Text(s) => s.split(',').map(str::to_string).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
