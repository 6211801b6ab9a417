// tests/config.rs
use last30days::config::models::ModelVendor;
use last30days::config::{Config, McpTransport, ENV_CONFIG_DIR};
use std::time::Duration;
use std::{env, fs};

const TOUCHED: &[&str] = &[
    ENV_CONFIG_DIR,
    "OPENAI_API_KEY",
    "XAI_API_KEY",
    "OPENROUTER_API_KEY",
    "XAI_MODEL_POLICY",
    "XAI_MODEL_PIN",
    "MCP_SEARXNG_COMMAND",
    "MCP_SEARXNG_TRANSPORT",
    "MCP_TIMEOUT_SECS",
    "BIRD_BIN",
];

fn clear_env() {
    for k in TOUCHED {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn env_wins_over_dotenv_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".env"),
        r#"
# keys
OPENAI_API_KEY=sk-from-file
XAI_API_KEY=xai-from-file
OPENROUTER_API_KEY=
XAI_MODEL_POLICY=pinned
XAI_MODEL_PIN=grok-test
MCP_SEARXNG_COMMAND='["uvx", "mcp-searxng"]'
MCP_TIMEOUT_SECS=30
"#,
    )
    .unwrap();
    env::set_var(ENV_CONFIG_DIR, dir.path());
    env::set_var("OPENAI_API_KEY", "sk-from-env");
    env::set_var("BIRD_BIN", "/opt/bird/bin/bird");

    let cfg = Config::load().unwrap();
    assert_eq!(cfg.openai_api_key.as_deref(), Some("sk-from-env"));
    assert_eq!(cfg.xai_api_key.as_deref(), Some("xai-from-file"));
    assert!(cfg.openrouter_api_key.is_none());
    assert_eq!(cfg.model_for(ModelVendor::Xai), "grok-test");
    assert_eq!(cfg.mcp_command, vec!["uvx", "mcp-searxng"]);
    assert_eq!(cfg.mcp_timeout, Duration::from_secs(30));
    assert_eq!(cfg.bird_bin, "/opt/bird/bin/bird");

    clear_env();
}

#[serial_test::serial]
#[test]
fn empty_config_dir_disables_the_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "OPENAI_API_KEY=sk-from-file\n").unwrap();

    env::set_var(ENV_CONFIG_DIR, "");
    let cfg = Config::load().unwrap();
    assert!(cfg.openai_api_key.is_none());

    // missing file is not an error
    env::set_var(ENV_CONFIG_DIR, dir.path().join("nowhere"));
    let cfg = Config::load().unwrap();
    assert!(cfg.openai_api_key.is_none());
    assert_eq!(cfg.mcp_timeout, Duration::from_secs(120));

    clear_env();
}

#[serial_test::serial]
#[test]
fn invalid_values_are_reported() {
    clear_env();
    env::set_var(ENV_CONFIG_DIR, "");

    env::set_var("MCP_SEARXNG_TRANSPORT", "carrier-pigeon");
    assert!(Config::load().is_err());
    env::set_var("MCP_SEARXNG_TRANSPORT", "stdio");
    assert_eq!(Config::load().unwrap().mcp_transport, McpTransport::Stdio);

    env::set_var("MCP_TIMEOUT_SECS", "0");
    assert!(Config::load().is_err());

    clear_env();
}
