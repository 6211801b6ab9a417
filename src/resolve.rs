// src/resolve.rs
//! Which upstream serves each category. `Availability::probe` is the only part
//! that touches the machine; everything after it is a pure decision.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{Config, HostContext, McpPreference, McpTransport};
use crate::ingest::types::{Category, SourceTag};

const BIRD_WHOAMI_TIMEOUT: Duration = Duration::from_secs(10);

/// How to reach the protocol-backed search service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpLaunch {
    Spawn(Vec<String>),
    AttachedStdio,
}

/// The protocol capability after its check. There is no variant that can be
/// selected and then fail with "not implemented".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpBackend {
    ProtocolBacked(McpLaunch),
    Unavailable { reason: String },
}

impl McpBackend {
    pub fn launch(&self) -> Option<&McpLaunch> {
        match self {
            McpBackend::ProtocolBacked(l) => Some(l),
            McpBackend::Unavailable { .. } => None,
        }
    }
}

/// What the machine offers, gathered once per run.
#[derive(Debug, Clone, Default)]
pub struct Availability {
    pub openai: bool,
    pub xai: bool,
    pub openrouter: bool,
    pub bird_installed: bool,
    /// Username reported by `bird whoami`; `Some` means authenticated.
    pub bird_user: Option<String>,
    pub host_context: HostContext,
    /// Protocol service found on this machine (regardless of preference).
    pub mcp_detected: Option<McpLaunch>,
    pub use_mcp: McpPreference,
}

impl Availability {
    pub async fn probe(cfg: &Config) -> Self {
        let bird_installed = which::which(&cfg.bird_bin).is_ok();
        let bird_user = if bird_installed {
            bird_whoami(&cfg.bird_bin).await
        } else {
            None
        };
        let avail = Self {
            openai: cfg.has_openai(),
            xai: cfg.has_xai(),
            openrouter: cfg.has_openrouter(),
            bird_installed,
            bird_user,
            host_context: cfg.host_context,
            mcp_detected: detect_mcp(cfg),
            use_mcp: cfg.use_mcp,
        };
        debug!(target: "resolve", ?avail, "probed availability");
        avail
    }

    pub fn bird_ready(&self) -> bool {
        self.bird_user.is_some()
    }
}

fn detect_mcp(cfg: &Config) -> Option<McpLaunch> {
    match cfg.mcp_transport {
        McpTransport::Stdio => Some(McpLaunch::AttachedStdio),
        McpTransport::Spawn => {
            let program = cfg.mcp_command.first()?;
            match which::which(program) {
                Ok(_) => Some(McpLaunch::Spawn(cfg.mcp_command.clone())),
                Err(e) => {
                    debug!(target: "resolve", %program, error = %e, "MCP command not on PATH");
                    None
                }
            }
        }
    }
}

/// `bird whoami`: first stdout line on success, `None` otherwise.
pub async fn bird_whoami(bin: &str) -> Option<String> {
    let mut cmd = Command::new(bin);
    cmd.arg("whoami").kill_on_drop(true);
    let out = match tokio::time::timeout(BIRD_WHOAMI_TIMEOUT, cmd.output()).await {
        Ok(Ok(out)) => out,
        Ok(Err(e)) => {
            debug!(target: "bird", error = %e, "whoami failed to run");
            return None;
        }
        Err(_) => {
            debug!(target: "bird", "whoami timed out");
            return None;
        }
    };
    if !out.status.success() {
        return None;
    }
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Apply `USE_CLAUDE_MCP` to what was detected.
pub fn mcp_backend(avail: &Availability) -> McpBackend {
    let unavailable = |reason: &str| McpBackend::Unavailable {
        reason: reason.to_string(),
    };
    if avail.use_mcp == McpPreference::Never {
        return unavailable("disabled by USE_CLAUDE_MCP=false");
    }
    // `true` still needs the host context.
    if avail.host_context != HostContext::Skill {
        return unavailable("not running inside a capability-aware host");
    }
    match &avail.mcp_detected {
        Some(l) => McpBackend::ProtocolBacked(l.clone()),
        None => unavailable("no protocol search service detected"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Protocol,
    DirectApi,
    None,
}

/// The upstream picked for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    OpenAi,
    Bird,
    Xai,
    Searxng(McpLaunch),
    HostWebsearch,
    Unavailable { reason: String },
}

impl Provider {
    pub fn tag(&self) -> SourceTag {
        match self {
            Provider::OpenRouter => SourceTag::OpenRouter,
            Provider::OpenAi => SourceTag::OpenAi,
            Provider::Bird => SourceTag::Bird,
            Provider::Xai => SourceTag::Xai,
            Provider::Searxng(_) => SourceTag::SearxngMcp,
            Provider::HostWebsearch => SourceTag::HostWebsearch,
            Provider::Unavailable { .. } => SourceTag::None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Provider::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub mode: SearchMode,
    pub backend: McpBackend,
    pub reddit: Provider,
    pub x: Provider,
    pub web: Provider,
}

impl Resolution {
    pub fn provider(&self, category: Category) -> &Provider {
        match category {
            Category::Reddit => &self.reddit,
            Category::X => &self.x,
            Category::Web => &self.web,
        }
    }
}

/// Fixed priority per category; protocol search only backs a category that
/// has no direct provider.
pub fn resolve(avail: &Availability) -> Resolution {
    let backend = mcp_backend(avail);
    let protocol = backend.launch().cloned();

    let reddit = if avail.openrouter {
        Provider::OpenRouter
    } else if avail.openai {
        Provider::OpenAi
    } else if let Some(l) = &protocol {
        Provider::Searxng(l.clone())
    } else {
        Provider::Unavailable {
            reason: "no OPENROUTER_API_KEY or OPENAI_API_KEY configured".into(),
        }
    };

    let x = if avail.bird_ready() {
        Provider::Bird
    } else if avail.xai {
        Provider::Xai
    } else if let Some(l) = &protocol {
        Provider::Searxng(l.clone())
    } else {
        let reason = if avail.bird_installed {
            "bird is installed but not authenticated and no XAI_API_KEY configured"
        } else {
            "no authenticated bird CLI and no XAI_API_KEY configured"
        };
        Provider::Unavailable {
            reason: reason.into(),
        }
    };

    let web = match &protocol {
        Some(l) => Provider::Searxng(l.clone()),
        None => Provider::HostWebsearch,
    };

    let mode = if protocol.is_some() {
        SearchMode::Protocol
    } else if avail.openrouter || avail.openai || avail.xai || avail.bird_ready() {
        SearchMode::DirectApi
    } else {
        SearchMode::None
    };

    info!(
        target: "resolve",
        ?mode,
        reddit = %reddit.tag(),
        x = %x.tag(),
        web = %web.tag(),
        "resolved sources"
    );
    Resolution {
        mode,
        backend,
        reddit,
        x,
        web,
    }
}

/// What the caller asked for with `--sources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRequest {
    #[default]
    Auto,
    Reddit,
    X,
    Both,
    Web,
}

impl FromStr for SourceRequest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceRequest::Auto),
            "reddit" => Ok(SourceRequest::Reddit),
            "x" => Ok(SourceRequest::X),
            "both" | "all" => Ok(SourceRequest::Both),
            "web" => Ok(SourceRequest::Web),
            other => Err(anyhow!(
                "unknown sources '{other}' (expected auto|reddit|x|both|web)"
            )),
        }
    }
}

/// Which keyed categories can be served at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailableSources {
    Both,
    Reddit,
    X,
    /// Neither Reddit nor X; only web search remains.
    Web,
}

pub fn available_sources(resolution: &Resolution) -> AvailableSources {
    match (resolution.reddit.is_available(), resolution.x.is_available()) {
        (true, true) => AvailableSources::Both,
        (true, false) => AvailableSources::Reddit,
        (false, true) => AvailableSources::X,
        (false, false) => AvailableSources::Web,
    }
}

/// The category set a run will actually search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EffectiveSources {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "both")]
    Both,
    #[serde(rename = "reddit")]
    Reddit,
    #[serde(rename = "x")]
    X,
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "reddit-web")]
    RedditWeb,
    #[serde(rename = "x-web")]
    XWeb,
    #[serde(rename = "none")]
    None,
}

impl EffectiveSources {
    pub fn categories(&self) -> &'static [Category] {
        match self {
            EffectiveSources::All => &[Category::Reddit, Category::X, Category::Web],
            EffectiveSources::Both => &[Category::Reddit, Category::X],
            EffectiveSources::Reddit => &[Category::Reddit],
            EffectiveSources::X => &[Category::X],
            EffectiveSources::Web => &[Category::Web],
            EffectiveSources::RedditWeb => &[Category::Reddit, Category::Web],
            EffectiveSources::XWeb => &[Category::X, Category::Web],
            EffectiveSources::None => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveSources::All => "all",
            EffectiveSources::Both => "both",
            EffectiveSources::Reddit => "reddit",
            EffectiveSources::X => "x",
            EffectiveSources::Web => "web",
            EffectiveSources::RedditWeb => "reddit-web",
            EffectiveSources::XWeb => "x-web",
            EffectiveSources::None => "none",
        }
    }
}

impl fmt::Display for EffectiveSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconcile a request with what is available. Never widens a single-category
/// request to the other category; `include_web` only adds web.
pub fn validate_sources(
    requested: SourceRequest,
    available: AvailableSources,
    include_web: bool,
) -> (EffectiveSources, Option<String>) {
    use AvailableSources as A;
    use EffectiveSources as E;
    use SourceRequest as R;

    if available == A::Web {
        return match requested {
            R::Auto | R::Web => (E::Web, None),
            _ => (
                E::Web,
                Some(
                    "No Reddit or X source is configured. Using web search only. \
                     Add keys to ~/.config/last30days/.env for Reddit/X."
                        .to_string(),
                ),
            ),
        };
    }

    match requested {
        R::Auto => {
            let eff = match (available, include_web) {
                (A::Both, true) => E::All,
                (A::Reddit, true) => E::RedditWeb,
                (A::X, true) => E::XWeb,
                (A::Both, false) => E::Both,
                (A::Reddit, false) => E::Reddit,
                (A::X, false) => E::X,
                (A::Web, _) => E::Web,
            };
            (eff, None)
        }
        R::Web => (E::Web, None),
        R::Both => {
            if available != A::Both {
                let missing = if available == A::Reddit {
                    "an X source (bird or XAI_API_KEY)"
                } else {
                    "a Reddit source (OPENROUTER_API_KEY or OPENAI_API_KEY)"
                };
                return (
                    E::None,
                    Some(format!(
                        "Requested both sources but {missing} is missing. \
                         Use --sources=auto to use what is available."
                    )),
                );
            }
            (if include_web { E::All } else { E::Both }, None)
        }
        R::Reddit => {
            if available == A::X {
                return (
                    E::None,
                    Some("Requested Reddit but only an X source is available.".to_string()),
                );
            }
            (if include_web { E::RedditWeb } else { E::Reddit }, None)
        }
        R::X => {
            if available == A::Reddit {
                return (
                    E::None,
                    Some("Requested X but only a Reddit source is available.".to_string()),
                );
            }
            (if include_web { E::XWeb } else { E::X }, None)
        }
    }
}
