// tests/dates.rs
use chrono::NaiveDate;
use last30days::dates::{extract_date_signals_at, is_date_in_range_at};
use last30days::ingest::types::DateConfidence;
use last30days::ingest::{clamp_relevance, coerce_relevance};
use serde_json::json;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn confidence_is_none_exactly_when_date_is_absent() {
    let today = d("2026-01-30");
    let cases = [
        ("https://example.com/2026/01/24/a", "", ""),
        ("https://example.com/a", "posted yesterday", ""),
        ("https://example.com/a", "", "24 January 2026 recap"),
        ("https://example.com/a", "no date here", "nor here"),
        ("https://example.com/99999999/a", "", ""),
        ("", "", ""),
    ];
    for (url, snippet, title) in cases {
        let s = extract_date_signals_at(url, snippet, title, today);
        assert_eq!(
            s.date().is_none(),
            s.confidence() == DateConfidence::None,
            "{url} / {snippet} / {title}"
        );
    }
}

#[test]
fn url_date_beats_conflicting_snippet() {
    let s = extract_date_signals_at(
        "https://news.example.com/2026/01/24/some-article",
        "Published January 2, 2026",
        "2025-12-31",
        d("2026-01-30"),
    );
    assert_eq!(s.date(), Some(d("2026-01-24")));
    assert_eq!(s.confidence(), DateConfidence::High);
}

#[test]
fn range_filter_bounds_and_fail_open() {
    let today = d("2026-01-30");
    let (from, to) = ("2026-01-01", "2026-01-30");
    assert!(is_date_in_range_at("2026-01-01", from, to, today));
    assert!(is_date_in_range_at("2026-01-30", from, to, today));
    assert!(!is_date_in_range_at("2025-12-31", from, to, today));
    assert!(!is_date_in_range_at("2026-01-31", from, to, today));
    assert!(is_date_in_range_at("today", from, to, today));
    assert!(is_date_in_range_at("yesterday", from, to, today));
    for junk in ["", "none", "2026-13-45", "last tuesday", "01/15/2026"] {
        assert!(is_date_in_range_at(junk, from, to, today), "{junk}");
    }
}

#[test]
fn relevance_always_lands_in_unit_interval() {
    let inputs = [
        json!(-5),
        json!(0),
        json!(0.42),
        json!(1),
        json!(17.5),
        json!("0.3"),
        json!(" 2 "),
        json!("-1"),
        json!("high"),
        json!(null),
        json!(true),
        json!([0.5]),
        json!({"v": 1}),
    ];
    for v in &inputs {
        let r = coerce_relevance(Some(v), 0.5);
        assert!((0.0..=1.0).contains(&r), "{v} -> {r}");
    }
    assert_eq!(coerce_relevance(None, 7.0), 1.0);
    for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0, 1e300] {
        let r = clamp_relevance(x);
        assert!((0.0..=1.0).contains(&r), "{x} -> {r}");
    }
}
