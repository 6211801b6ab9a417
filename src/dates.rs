// src/dates.rs
//! Date signals shared by every provider: pull a best-effort publication date
//! out of a URL, snippet or title, and decide whether it falls in the window.
//!
//! Precedence (first hit wins): URL path → `high`, snippet → `med`,
//! title → `low`, nothing → `none`. Unknown dates are never filtered out.

use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::{DateSignal, KnownConfidence};

static URL_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").unwrap(),
        Regex::new(r"/(\d{4})-(\d{2})-(\d{2})/").unwrap(),
        // bare /YYYYMMDD segment, not a prefix of a longer number
        Regex::new(r"/(\d{4})(\d{2})(\d{2})(?:\D|$)").unwrap(),
    ]
});

static RE_TODAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").unwrap());
static RE_YESTERDAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\byesterday\b").unwrap());
static RE_DAYS_AGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)\s+days?\s+ago").unwrap());

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

// "24 January 2026", "24 february. 2026" (full month names only)
static RE_DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({MONTHS})[,.]?\s+(\d{{4}})")).unwrap()
});
// "January 24, 2026", "January. 24 2026"
static RE_MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})[,.]?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})"
    ))
    .unwrap()
});
static RE_ISO_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})[-/](\d{2})[-/](\d{2})").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_ascii_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(n)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Today in local time; what relative phrases resolve against by default.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Strict `YYYY-MM-DD`; anything else (datetimes, slashes, short forms) is rejected.
pub fn parse_strict_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.len() != 10 {
        return None;
    }
    let b = s.as_bytes();
    let shape_ok = b.iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'-',
        _ => c.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Date embedded in a URL path. Digit runs that do not form a real calendar
/// date are skipped so a numeric post id cannot masquerade as a date.
pub fn extract_date_from_url(url: &str) -> Option<NaiveDate> {
    for re in URL_PATTERNS.iter() {
        for caps in re.captures_iter(url) {
            if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
                return Some(d);
            }
        }
    }
    None
}

/// Date or relative-date phrase in free text, resolved against `today`.
pub fn extract_date_from_text(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if text.trim().is_empty() {
        return None;
    }
    if RE_TODAY.is_match(text) {
        return Some(today);
    }
    if RE_YESTERDAY.is_match(text) {
        return Some(today - Duration::days(1));
    }
    if let Some(caps) = RE_DAYS_AGO.captures(text) {
        let back = caps[1]
            .parse::<i64>()
            .ok()
            .and_then(Duration::try_days)
            .and_then(|delta| today.checked_sub_signed(delta));
        if let Some(d) = back {
            return Some(d);
        }
    }
    for caps in RE_DAY_MONTH_YEAR.captures_iter(text) {
        let month = month_number(&caps[2]);
        if let Some(d) = month.and_then(|m| {
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, m, caps[1].parse().ok()?)
        }) {
            return Some(d);
        }
    }
    for caps in RE_MONTH_DAY_YEAR.captures_iter(text) {
        let month = month_number(&caps[1]);
        if let Some(d) = month.and_then(|m| {
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, m, caps[2].parse().ok()?)
        }) {
            return Some(d);
        }
    }
    for caps in RE_ISO_LIKE.captures_iter(text) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(d);
        }
    }
    None
}

/// Best-effort date with confidence, resolving relative phrases against `today`.
pub fn extract_date_signals_at(url: &str, snippet: &str, title: &str, today: NaiveDate) -> DateSignal {
    if let Some(date) = extract_date_from_url(url) {
        return DateSignal::Known {
            date,
            confidence: KnownConfidence::High,
        };
    }
    if let Some(date) = extract_date_from_text(snippet, today) {
        return DateSignal::Known {
            date,
            confidence: KnownConfidence::Med,
        };
    }
    if let Some(date) = extract_date_from_text(title, today) {
        return DateSignal::Known {
            date,
            confidence: KnownConfidence::Low,
        };
    }
    DateSignal::Unknown
}

pub fn extract_date_signals(url: &str, snippet: &str, title: &str) -> DateSignal {
    extract_date_signals_at(url, snippet, title, local_today())
}

/// Parse a candidate date: strict ISO, or the literals `today`/`yesterday`.
fn parse_candidate(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("today") {
        return Some(today);
    }
    if s.eq_ignore_ascii_case("yesterday") {
        return Some(today - Duration::days(1));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Inclusive range check on raw strings. Fails open: if anything cannot be
/// parsed (empty, `none`, garbage, a bad bound) the item is kept.
pub fn is_date_in_range_at(candidate: &str, from: &str, to: &str, today: NaiveDate) -> bool {
    let parsed = (
        parse_candidate(candidate, today),
        parse_candidate(from, today),
        parse_candidate(to, today),
    );
    match parsed {
        (Some(c), Some(f), Some(t)) => f <= c && c <= t,
        _ => true,
    }
}

pub fn is_date_in_range(candidate: &str, from: &str, to: &str) -> bool {
    is_date_in_range_at(candidate, from, to, local_today())
}
