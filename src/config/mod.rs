// src/config/mod.rs
//! Run configuration. Built once at startup and passed by reference; nothing
//! below the binary reads the process environment directly.

pub mod models;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use crate::config::models::{select_model, ModelSetting, ModelVendor};

pub const ENV_CONFIG_DIR: &str = "LAST30DAYS_CONFIG_DIR";
const DEFAULT_MCP_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BIRD_BIN: &str = "bird";

/// `USE_CLAUDE_MCP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum McpPreference {
    #[default]
    Auto,
    Always,
    Never,
}

/// Whether we run from a terminal or as a skill inside a capability-aware host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostContext {
    #[default]
    Cli,
    Skill,
}

/// How the protocol-backed search service is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum McpTransport {
    /// Launch `MCP_SEARXNG_COMMAND` as a child process.
    #[default]
    Spawn,
    /// The host already attached the service to our stdin/stdout.
    Stdio,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openai_model: ModelSetting,
    pub xai_model: ModelSetting,
    pub openrouter_model: ModelSetting,
    pub use_mcp: McpPreference,
    pub host_context: HostContext,
    pub mcp_command: Vec<String>,
    pub mcp_transport: McpTransport,
    pub mcp_timeout: Duration,
    pub mcp_strict_ids: bool,
    /// Overrides the per-depth category budget when set.
    pub category_timeout: Option<Duration>,
    pub bird_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            xai_api_key: None,
            openrouter_api_key: None,
            openai_model: ModelSetting::default_for(ModelVendor::OpenAi),
            xai_model: ModelSetting::default_for(ModelVendor::Xai),
            openrouter_model: ModelSetting::default_for(ModelVendor::OpenRouter),
            use_mcp: McpPreference::Auto,
            host_context: HostContext::Cli,
            mcp_command: Vec::new(),
            mcp_transport: McpTransport::Spawn,
            mcp_timeout: Duration::from_secs(DEFAULT_MCP_TIMEOUT_SECS),
            mcp_strict_ids: false,
            category_timeout: None,
            bird_bin: DEFAULT_BIRD_BIN.to_string(),
        }
    }
}

impl Config {
    /// Process environment first, then the dotenv file.
    pub fn load() -> Result<Self> {
        let dir_override = std::env::var(ENV_CONFIG_DIR).ok();
        let home = std::env::var_os("HOME").map(PathBuf::from);
        let file_vars = match config_file_path(dir_override.as_deref(), home.as_deref()) {
            Some(path) if path.exists() => read_env_file(&path)?,
            Some(path) => {
                debug!(target: "config", path = %path.display(), "no config file");
                HashMap::new()
            }
            None => HashMap::new(),
        };
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut cfg = Config {
            openai_api_key: get("OPENAI_API_KEY"),
            xai_api_key: get("XAI_API_KEY"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            ..Config::default()
        };

        if let Some(p) = get("OPENAI_MODEL_POLICY") {
            cfg.openai_model = ModelSetting::new(p, get("OPENAI_MODEL_PIN"));
        } else {
            cfg.openai_model.pin = get("OPENAI_MODEL_PIN");
        }
        if let Some(p) = get("XAI_MODEL_POLICY") {
            cfg.xai_model = ModelSetting::new(p, get("XAI_MODEL_PIN"));
        } else {
            cfg.xai_model.pin = get("XAI_MODEL_PIN");
        }
        if let Some(p) = get("OPENROUTER_MODEL_POLICY") {
            cfg.openrouter_model = ModelSetting::new(p, get("OPENROUTER_MODEL_PIN"));
        } else {
            cfg.openrouter_model.pin = get("OPENROUTER_MODEL_PIN");
        }

        cfg.use_mcp = match get("USE_CLAUDE_MCP").map(|v| v.to_ascii_lowercase()) {
            None => McpPreference::Auto,
            Some(v) => match v.as_str() {
                "auto" => McpPreference::Auto,
                "true" | "1" | "yes" => McpPreference::Always,
                "false" | "0" | "no" => McpPreference::Never,
                other => {
                    warn!(target: "config", value = other, "unknown USE_CLAUDE_MCP, using auto");
                    McpPreference::Auto
                }
            },
        };

        match get("CLAUDE_CONTEXT").map(|v| v.to_ascii_lowercase()) {
            Some(v) if v == "skill" => cfg.host_context = HostContext::Skill,
            Some(v) if v == "cli" => cfg.host_context = HostContext::Cli,
            Some(other) => bail!("CLAUDE_CONTEXT must be cli or skill, got '{other}'"),
            None => {
                let in_host = get("CLAUDE_CODE").is_some() || get("CLAUDE").is_some();
                cfg.host_context = if in_host {
                    HostContext::Skill
                } else {
                    HostContext::Cli
                };
            }
        }

        if let Some(raw) = get("MCP_SEARXNG_COMMAND") {
            cfg.mcp_command = parse_command(&raw)?;
        }
        cfg.mcp_transport = match get("MCP_SEARXNG_TRANSPORT").map(|v| v.to_ascii_lowercase()) {
            None => McpTransport::Spawn,
            Some(v) if v == "spawn" => McpTransport::Spawn,
            Some(v) if v == "stdio" => McpTransport::Stdio,
            Some(other) => bail!("MCP_SEARXNG_TRANSPORT must be spawn or stdio, got '{other}'"),
        };
        if let Some(secs) = get("MCP_TIMEOUT_SECS") {
            cfg.mcp_timeout = parse_secs("MCP_TIMEOUT_SECS", &secs)?;
        }
        cfg.mcp_strict_ids = get("MCP_STRICT_IDS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if let Some(secs) = get("LAST30DAYS_CATEGORY_TIMEOUT_SECS") {
            cfg.category_timeout = Some(parse_secs("LAST30DAYS_CATEGORY_TIMEOUT_SECS", &secs)?);
        }
        if let Some(bin) = get("BIRD_BIN") {
            cfg.bird_bin = bin;
        }
        Ok(cfg)
    }

    pub fn has_openai(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn has_xai(&self) -> bool {
        self.xai_api_key.is_some()
    }

    pub fn has_openrouter(&self) -> bool {
        self.openrouter_api_key.is_some()
    }

    pub fn model_for(&self, vendor: ModelVendor) -> String {
        let setting = match vendor {
            ModelVendor::OpenAi => &self.openai_model,
            ModelVendor::Xai => &self.xai_model,
            ModelVendor::OpenRouter => &self.openrouter_model,
        };
        select_model(vendor, setting)
    }
}

/// `$LAST30DAYS_CONFIG_DIR/.env`, `~/.config/last30days/.env`, or nothing when
/// the override is set to the empty string.
pub fn config_file_path(dir_override: Option<&str>, home: Option<&Path>) -> Option<PathBuf> {
    match dir_override {
        Some("") => None,
        Some(dir) => Some(Path::new(dir).join(".env")),
        None => home.map(|h| h.join(".config").join("last30days").join(".env")),
    }
}

/// Parse a dotenv file; keys with empty values are dropped.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let mut out = HashMap::new();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("parsing config file {}", path.display()))?;
        if !value.trim().is_empty() {
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// argv from either a JSON array or a whitespace-separated string.
pub fn parse_command(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    let argv: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("MCP_SEARXNG_COMMAND is not a JSON string array")?
    } else {
        raw.split_whitespace().map(str::to_string).collect()
    };
    if argv.is_empty() {
        return Err(anyhow!("MCP_SEARXNG_COMMAND is empty"));
    }
    Ok(argv)
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .parse()
        .with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'"))?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_lookup_gives_defaults() {
        let c = cfg(&[]).unwrap();
        assert!(!c.has_openai() && !c.has_xai() && !c.has_openrouter());
        assert_eq!(c.use_mcp, McpPreference::Auto);
        assert_eq!(c.host_context, HostContext::Cli);
        assert_eq!(c.mcp_timeout, Duration::from_secs(120));
        assert_eq!(c.bird_bin, "bird");
        assert!(c.mcp_command.is_empty());
    }

    #[test]
    fn empty_values_are_unset() {
        let c = cfg(&[("OPENAI_API_KEY", "   "), ("XAI_API_KEY", "xk")]).unwrap();
        assert!(!c.has_openai());
        assert!(c.has_xai());
    }

    #[test]
    fn host_context_auto_detects() {
        let c = cfg(&[("CLAUDE_CODE", "1")]).unwrap();
        assert_eq!(c.host_context, HostContext::Skill);
        let c = cfg(&[("CLAUDE_CODE", "1"), ("CLAUDE_CONTEXT", "cli")]).unwrap();
        assert_eq!(c.host_context, HostContext::Cli);
        assert!(cfg(&[("CLAUDE_CONTEXT", "desktop")]).is_err());
    }

    #[test]
    fn command_parsing() {
        assert_eq!(
            parse_command(r#"["docker","run","-i","searxng mcp"]"#).unwrap(),
            vec!["docker", "run", "-i", "searxng mcp"]
        );
        assert_eq!(
            parse_command("  uvx  mcp-searxng ").unwrap(),
            vec!["uvx", "mcp-searxng"]
        );
        assert!(parse_command("[]").is_err());
        assert!(parse_command("[1,2]").is_err());
    }

    #[test]
    fn timeouts_must_be_positive_integers() {
        assert!(cfg(&[("MCP_TIMEOUT_SECS", "abc")]).is_err());
        assert!(cfg(&[("MCP_TIMEOUT_SECS", "0")]).is_err());
        let c = cfg(&[("LAST30DAYS_CATEGORY_TIMEOUT_SECS", "45")]).unwrap();
        assert_eq!(c.category_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn config_path_rules() {
        let home = Path::new("/home/u");
        assert_eq!(config_file_path(Some(""), Some(home)), None);
        assert_eq!(
            config_file_path(Some("/etc/l30"), Some(home)),
            Some(PathBuf::from("/etc/l30/.env"))
        );
        assert_eq!(
            config_file_path(None, Some(home)),
            Some(PathBuf::from("/home/u/.config/last30days/.env"))
        );
        assert_eq!(config_file_path(None, None), None);
    }

    #[test]
    fn pinned_models_flow_through() {
        let c = cfg(&[("XAI_MODEL_POLICY", "pinned"), ("XAI_MODEL_PIN", "grok-x")]).unwrap();
        assert_eq!(c.model_for(ModelVendor::Xai), "grok-x");
        assert_eq!(c.model_for(ModelVendor::OpenAi), "gpt-4.1");
    }
}
