// src/ingest/timestamp.rs
use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use super::types::TIMESTAMP_UNAVAILABLE;

/// Display format of the `<time title=...>` attribute, e.g. `Nov 12, 2025, 09:30 AM`.
pub const SOURCE_FORMAT: &str = "%b %d, %Y, %I:%M %p";
pub const TARGET_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Converts a feed timestamp from `origin` into `target`.
/// Anything unparsable comes back as [`TIMESTAMP_UNAVAILABLE`].
pub fn convert_source_timestamp(raw: &str, origin: Tz, target: Tz) -> String {
    let raw = raw.trim();
    if raw.is_empty() || raw == TIMESTAMP_UNAVAILABLE {
        return TIMESTAMP_UNAVAILABLE.to_string();
    }
    let Ok(naive) = NaiveDateTime::parse_from_str(raw, SOURCE_FORMAT) else {
        return TIMESTAMP_UNAVAILABLE.to_string();
    };
    // DST gaps have no local instant; folds resolve to the earlier one.
    match origin.from_local_datetime(&naive).earliest() {
        Some(local) => local
            .with_timezone(&target)
            .format(TARGET_FORMAT)
            .to_string(),
        None => TIMESTAMP_UNAVAILABLE.to_string(),
    }
}
