// src/ingest/mod.rs
pub mod browser;
pub mod collector;
pub mod scheduler;
pub mod timestamp;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_mention() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"@\S+").unwrap())
}

fn re_hashtag() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\B#\S+").unwrap())
}

fn re_url() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"http\S+").unwrap())
}

fn re_word() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\w+").unwrap())
}

/// Canonical form of a post body for classification.
///
/// Lowercases, strips mentions/hashtags/URLs, keeps only word runs separated
/// by single spaces and drops single-letter tokens. Applying it twice gives
/// the same result as applying it once.
pub fn normalize_post_text(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    // 1) Lowercase
    let lowered = raw.to_lowercase();

    // 2) Mentions, hashtags, URLs (in that order)
    let out = re_mention().replace_all(&lowered, "");
    let out = re_hashtag().replace_all(&out, "");
    let out = re_url().replace_all(&out, "");

    // 3) Word runs only, single-letter tokens dropped, single spaces
    let tokens: Vec<&str> = re_word()
        .find_iter(&out)
        .map(|m| m.as_str())
        .filter(|t| !is_single_letter(t))
        .collect();

    // 4) Escape double quotes (kept for storage compatibility)
    tokens.join(" ").replace('"', "\\\"")
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

/// Rejects empty normalized text and retweets (`rt` / `rt ...`).
pub fn is_valid_post(normalized: &str) -> bool {
    if normalized.is_empty() {
        return false;
    }
    !(normalized == "rt" || normalized.starts_with("rt "))
}
