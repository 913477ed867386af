// src/ingest/types.rs
use serde::{Deserialize, Serialize};

/// Marker stored when a source timestamp is missing or cannot be parsed.
pub const TIMESTAMP_UNAVAILABLE: &str = "N/A";

/// One post collected from the monitored feed, keyed by `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub url: String,
    /// Source timestamp as displayed by the feed (origin timezone).
    pub time_str: String,
    /// Converted timestamp, `%Y-%m-%d %H:%M:%S` in the target timezone.
    pub time: String,
    /// Raw post text.
    pub content: String,
    /// Normalized text fed to the classifier.
    pub clean_content: String,
}
