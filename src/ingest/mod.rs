// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::dates::{extract_date_signals_at, parse_strict_date};
use crate::ingest::types::{
    CanonicalItem, Category, DateSignal, ItemDetail, SearchWindow,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Hosts and paths on reddit.com that are never discussion threads.
const REDDIT_EXCLUDED: &[&str] = &[
    "business.reddit.com",
    "developers.reddit.com",
    "reddit.com/r/ads/",
    "reddit.com/r/redditsecurity/",
];

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SUBREDDIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/r/([^/?#]+)").unwrap());
static RE_X_AUTHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/.])(?:x|twitter)\.com/([^/?#]+)/").unwrap());
static RE_DOMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://(?:www\.)?([^/?#:]+)").unwrap());

/// Normalize snippet text: decode entities, strip tags, straighten quotes,
/// collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = RE_TAGS.replace_all(&out, "").to_string();
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    out = RE_WS.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Cut to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Clamp into `[0.0, 1.0]`; NaN becomes 0.0.
pub fn clamp_relevance(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Relevance from a loosely-typed JSON value: numbers and numeric strings are
/// accepted, anything else falls back to `default`. Always within `[0, 1]`.
pub fn coerce_relevance(v: Option<&Value>, default: f64) -> f64 {
    let raw = match v {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match raw {
        Some(x) if x.is_finite() => clamp_relevance(x),
        Some(x) if x == f64::INFINITY => 1.0,
        Some(x) if x == f64::NEG_INFINITY => 0.0,
        _ => clamp_relevance(default),
    }
}

/// Deterministic id derived from the URL. Ids are display handles, not join
/// keys, so a truncated digest is enough.
pub fn id_from_url(category: Category, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(13);
    out.push(match category {
        Category::Reddit => 'R',
        Category::X => 'X',
        Category::Web => 'W',
    });
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Subreddit name from `/r/<name>/...`, or empty.
pub fn extract_subreddit(url: &str) -> String {
    RE_SUBREDDIT
        .captures(url)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// Author handle from `x.com/<handle>/status/...` (or twitter.com), or empty.
pub fn extract_author_handle(url: &str) -> String {
    RE_X_AUTHOR
        .captures(url)
        .map(|c| c[1].trim_start_matches('@').to_string())
        .unwrap_or_default()
}

/// Host without a leading `www.`, or empty.
pub fn extract_domain(url: &str) -> String {
    RE_DOMAIN
        .captures(url.trim())
        .map(|c| c[1].to_ascii_lowercase())
        .unwrap_or_default()
}

/// Drop a leading `r/` or `/r/` from a model-supplied subreddit name.
pub fn clean_subreddit(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_prefix("/r/").or_else(|| s.strip_prefix("r/")).unwrap_or(s);
    s.trim_matches('/').to_string()
}

/// On reddit.com and not an administrative/non-discussion area.
pub fn is_reddit_discussion_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("reddit.com") && !REDDIT_EXCLUDED.iter().any(|p| lower.contains(p))
}

/// On one of the platform's two accepted hosts.
pub fn is_x_url(url: &str) -> bool {
    matches!(extract_domain(url).as_str(), "x.com" | "twitter.com")
}

/// Provider date if it is strict `YYYY-MM-DD` (→ `high`), else the extractor.
pub fn resolve_date(
    provided: Option<&str>,
    url: &str,
    snippet: &str,
    title: &str,
    today: NaiveDate,
) -> DateSignal {
    match provided.and_then(parse_strict_date) {
        Some(d) => DateSignal::high(d),
        None => extract_date_signals_at(url, snippet, title, today),
    }
}

/// Calendar date of a machine-written timestamp: strict `YYYY-MM-DD`,
/// RFC 3339, a naive ISO datetime, or the classic Twitter `createdAt` shape.
pub fn timestamp_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = parse_strict_date(s) {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.date_naive());
    }
    s.get(..10).and_then(parse_strict_date)
}

/// Provider id when present, otherwise one derived from the URL.
pub fn item_id(category: Category, provided: &str, url: &str) -> String {
    let provided = provided.trim();
    if provided.is_empty() {
        id_from_url(category, url)
    } else {
        provided.to_string()
    }
}

/// String field of a JSON object, trimmed; empty when missing or not a string.
pub(crate) fn str_field<'a>(obj: &'a Value, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|s| !s.trim().is_empty()))
        .map(str::trim)
        .unwrap_or("")
}

/// A raw web result handed back by the host's own web search.
#[derive(Debug, Clone, Deserialize)]
pub struct HostWebResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "content", alias = "description")]
    pub snippet: String,
}

/// Date-detect and window-filter results that arrived without dates.
pub fn apply_date_detection(
    raw: Vec<HostWebResult>,
    window: &SearchWindow,
    today: NaiveDate,
) -> Vec<CanonicalItem> {
    let mut out = Vec::with_capacity(raw.len());
    for r in raw {
        if r.url.trim().is_empty() {
            continue;
        }
        let snippet = normalize_text(&r.snippet);
        let signal = extract_date_signals_at(&r.url, &snippet, &r.title, today);
        if !window.admits(signal.date()) {
            continue;
        }
        out.push(CanonicalItem::new(
            id_from_url(Category::Web, &r.url),
            r.url.clone(),
            normalize_text(&r.title),
            ItemDetail::Web {
                source_domain: extract_domain(&r.url),
            },
            signal,
            0.5,
            truncate_chars(&snippet, 200),
        ));
    }
    out
}

/// Keep the first item per URL, preserving order.
pub fn dedup_by_url(items: Vec<CanonicalItem>) -> Vec<CanonicalItem> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|it| seen.insert(it.url.trim_end_matches('/').to_ascii_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::DateConfidence;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn normalize_text_decodes_and_strips() {
        let s = "  <b>Hello</b>&nbsp;&nbsp; &ldquo;world&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Hello "world""#);
    }

    #[test]
    fn relevance_is_always_clamped() {
        assert_eq!(coerce_relevance(Some(&json!(1.7)), 0.5), 1.0);
        assert_eq!(coerce_relevance(Some(&json!(-3)), 0.5), 0.0);
        assert_eq!(coerce_relevance(Some(&json!("0.25")), 0.5), 0.25);
        assert_eq!(coerce_relevance(Some(&json!("12")), 0.5), 1.0);
        assert_eq!(coerce_relevance(Some(&json!("high")), 0.5), 0.5);
        assert_eq!(coerce_relevance(Some(&json!(null)), 0.5), 0.5);
        assert_eq!(coerce_relevance(None, 0.0), 0.0);
        assert_eq!(coerce_relevance(Some(&json!("inf")), 0.5), 1.0);
        assert_eq!(coerce_relevance(Some(&json!("NaN")), 0.3), 0.3);
        assert_eq!(clamp_relevance(f64::NAN), 0.0);
    }

    #[test]
    fn ids_are_stable_per_url() {
        let a = id_from_url(Category::Reddit, "https://www.reddit.com/r/a/comments/1/x/");
        let b = id_from_url(Category::Reddit, "https://www.reddit.com/r/a/comments/1/x/");
        let c = id_from_url(Category::Reddit, "https://www.reddit.com/r/a/comments/2/y/");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with('R'));
        assert_eq!(a.len(), 13);
    }

    #[test]
    fn url_substructure() {
        assert_eq!(
            extract_subreddit("https://www.reddit.com/r/rust/comments/abc/title/"),
            "rust"
        );
        assert_eq!(extract_subreddit("https://www.reddit.com/user/foo"), "");
        assert_eq!(
            extract_author_handle("https://x.com/jack/status/20"),
            "jack"
        );
        assert_eq!(
            extract_author_handle("https://twitter.com/someone/status/1"),
            "someone"
        );
        assert_eq!(extract_author_handle("https://notx.com/a/status/1"), "");
        assert_eq!(extract_domain("https://www.Example.com/a/b"), "example.com");
        assert_eq!(extract_domain("http://blog.example.org:8080/x"), "blog.example.org");
        assert_eq!(extract_domain("not a url"), "");
    }

    #[test]
    fn subreddit_prefix_cleanup_keeps_names_starting_with_r() {
        assert_eq!(clean_subreddit("r/rust"), "rust");
        assert_eq!(clean_subreddit("/r/rust/"), "rust");
        assert_eq!(clean_subreddit("rust"), "rust");
        assert_eq!(clean_subreddit("rollercoasters"), "rollercoasters");
    }

    #[test]
    fn domain_validation() {
        assert!(is_reddit_discussion_url("https://www.reddit.com/r/rust/comments/1/x/"));
        assert!(!is_reddit_discussion_url("https://business.reddit.com/advertise"));
        assert!(!is_reddit_discussion_url("https://developers.reddit.com/docs"));
        assert!(!is_reddit_discussion_url("https://www.reddit.com/r/ads/comments/1/x/"));
        assert!(!is_reddit_discussion_url("https://example.com/reddit"));

        assert!(is_x_url("https://x.com/a/status/1"));
        assert!(is_x_url("https://twitter.com/a/status/1"));
        assert!(!is_x_url("https://notx.com/a/status/1"));
        assert!(!is_x_url("https://example.com/?u=x.com"));
        assert!(!is_x_url("https://mobile.twitter.com/a/status/1"));
    }

    #[test]
    fn provided_date_must_be_strict() {
        let today = d("2026-01-30");
        let ok = resolve_date(Some("2026-01-15"), "https://e.com/a", "", "", today);
        assert_eq!(ok.confidence(), DateConfidence::High);
        let bad = resolve_date(Some("Jan 15"), "https://e.com/a", "2 days ago", "", today);
        assert_eq!(bad.confidence(), DateConfidence::Med);
        assert_eq!(bad.date(), Some(d("2026-01-28")));
    }

    #[test]
    fn timestamps_reduce_to_dates() {
        assert_eq!(timestamp_date("2026-01-15"), Some(d("2026-01-15")));
        assert_eq!(timestamp_date("2026-01-15T23:10:00Z"), Some(d("2026-01-15")));
        assert_eq!(timestamp_date("2026-01-15T23:10:00.123"), Some(d("2026-01-15")));
        assert_eq!(
            timestamp_date("Thu Jan 15 10:00:00 +0000 2026"),
            Some(d("2026-01-15"))
        );
        assert_eq!(timestamp_date("2026-01-15 10:00"), Some(d("2026-01-15")));
        assert_eq!(timestamp_date("last week"), None);
        assert_eq!(timestamp_date(""), None);
    }

    #[test]
    fn host_results_are_detected_and_filtered() {
        let window = SearchWindow::parse("2026-01-01", "2026-01-30").unwrap();
        let raw = vec![
            HostWebResult {
                url: "https://news.example.com/2026/01/24/some-article".into(),
                title: "Widget recall".into(),
                snippet: String::new(),
            },
            HostWebResult {
                url: "https://old.example.com/2025/06/01/stale".into(),
                title: "Old".into(),
                snippet: String::new(),
            },
            HostWebResult {
                url: "https://undated.example.com/post".into(),
                title: "No date".into(),
                snippet: "nothing".into(),
            },
        ];
        let out = apply_date_detection(raw, &window, d("2026-01-30"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].date(), Some(d("2026-01-24")));
        assert_eq!(out[0].date_confidence(), DateConfidence::High);
        assert_eq!(out[1].date(), None);
        assert_eq!(out[1].date_confidence(), DateConfidence::None);
    }
}
