// src/ingest/types.rs
use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The three upstream categories a run can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Reddit,
    X,
    Web,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Reddit, Category::X, Category::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Reddit => "reddit",
            Category::X => "x",
            Category::Web => "web",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls requested result counts and timeouts per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    Quick,
    #[default]
    Default,
    Deep,
}

impl Depth {
    /// Pick the value for this depth out of a `(quick, default, deep)` triple.
    pub fn pick<T: Copy>(&self, table: (T, T, T)) -> T {
        match self {
            Depth::Quick => table.0,
            Depth::Default => table.1,
            Depth::Deep => table.2,
        }
    }

    /// Per-category fan-out budget when the config does not override it.
    pub fn category_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.pick((30, 120, 180)))
    }
}

impl FromStr for Depth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(Depth::Quick),
            "default" => Ok(Depth::Default),
            "deep" => Ok(Depth::Deep),
            other => Err(anyhow!("unknown depth '{other}' (expected quick|default|deep)")),
        }
    }
}

/// How much we trust an item's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateConfidence {
    High,
    Med,
    Low,
    None,
}

impl DateConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateConfidence::High => "high",
            DateConfidence::Med => "med",
            DateConfidence::Low => "low",
            DateConfidence::None => "none",
        }
    }
}

/// Confidence levels a dated item may carry. `none` is not among them, so it
/// can only come from `DateSignal::Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownConfidence {
    High,
    Med,
    Low,
}

impl From<KnownConfidence> for DateConfidence {
    fn from(c: KnownConfidence) -> Self {
        match c {
            KnownConfidence::High => DateConfidence::High,
            KnownConfidence::Med => DateConfidence::Med,
            KnownConfidence::Low => DateConfidence::Low,
        }
    }
}

/// A best-effort date paired with its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSignal {
    Known {
        date: NaiveDate,
        confidence: KnownConfidence,
    },
    Unknown,
}

impl DateSignal {
    pub fn high(date: NaiveDate) -> Self {
        DateSignal::Known {
            date,
            confidence: KnownConfidence::High,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateSignal::Known { date, .. } => Some(*date),
            DateSignal::Unknown => None,
        }
    }

    pub fn confidence(&self) -> DateConfidence {
        match self {
            DateSignal::Known { confidence, .. } => (*confidence).into(),
            DateSignal::Unknown => DateConfidence::None,
        }
    }
}

/// Inclusive calendar-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SearchWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(anyhow!("search window starts after it ends ({from} > {to})"));
        }
        Ok(Self { from, to })
    }

    /// Parse two strict `YYYY-MM-DD` bounds.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let from = NaiveDate::parse_from_str(from.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow!("invalid window start '{from}': {e}"))?;
        let to = NaiveDate::parse_from_str(to.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow!("invalid window end '{to}': {e}"))?;
        Self::new(from, to)
    }

    /// `[today - days, today]`, starting at the earliest representable date
    /// when `days` reaches past it.
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        Self {
            from: today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            to: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Fail-open variant: an unknown date is always admitted.
    pub fn admits(&self, date: Option<NaiveDate>) -> bool {
        date.map_or(true, |d| self.contains(d))
    }
}

/// Category-specific attribute of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ItemDetail {
    Reddit { subreddit: String },
    X { author_handle: String },
    Web { source_domain: String },
}

impl ItemDetail {
    pub fn category(&self) -> Category {
        match self {
            ItemDetail::Reddit { .. } => Category::Reddit,
            ItemDetail::X { .. } => Category::X,
            ItemDetail::Web { .. } => Category::Web,
        }
    }
}

/// The normalized unit returned to the caller. Immutable once built: the
/// date pair and the clamped relevance are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalItem {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(flatten)]
    pub detail: ItemDetail,
    date: Option<NaiveDate>,
    date_confidence: DateConfidence,
    relevance: f64,
    pub why_relevant: String,
}

impl CanonicalItem {
    pub fn new(
        id: String,
        url: String,
        title: String,
        detail: ItemDetail,
        signal: DateSignal,
        relevance: f64,
        why_relevant: String,
    ) -> Self {
        Self {
            id,
            url,
            title,
            detail,
            date: signal.date(),
            date_confidence: signal.confidence(),
            relevance: crate::ingest::clamp_relevance(relevance),
            why_relevant,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn date_confidence(&self) -> DateConfidence {
        self.date_confidence
    }

    /// Always within `[0, 1]`.
    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn category(&self) -> Category {
        self.detail.category()
    }
}

/// Which upstream actually served a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "openai")]
    OpenAi,
    Bird,
    Xai,
    SearxngMcp,
    HostWebsearch,
    /// No upstream could serve the category.
    None,
    Error,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::OpenRouter => "openrouter",
            SourceTag::OpenAi => "openai",
            SourceTag::Bird => "bird",
            SourceTag::Xai => "xai",
            SourceTag::SearxngMcp => "searxng_mcp",
            SourceTag::HostWebsearch => "host_websearch",
            SourceTag::None => "none",
            SourceTag::Error => "error",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The orchestrator's unit of work; produced even on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub items: Vec<CanonicalItem>,
    pub source: SourceTag,
}

impl ProviderResult {
    pub fn new(items: Vec<CanonicalItem>, source: SourceTag) -> Self {
        Self { items, source }
    }

    pub fn error() -> Self {
        Self {
            items: Vec::new(),
            source: SourceTag::Error,
        }
    }
}

/// What every adapter receives for one run.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub topic: String,
    pub window: SearchWindow,
    pub depth: Depth,
    /// Date that `today`/`yesterday`/`N days ago` resolve against.
    pub today: NaiveDate,
}

/// One category's search+normalize pipeline.
#[async_trait::async_trait]
pub trait CategorySearch: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>>;
    fn source(&self) -> SourceTag;
}
