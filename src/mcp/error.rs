// src/mcp/error.rs
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to start MCP server `{command}`: {source}")]
    Startup {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send request to MCP server: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to read from MCP server: {0}")]
    Receive(#[source] std::io::Error),

    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    #[error("MCP server process exited (status {status:?}): {stderr}")]
    ProcessExited { status: Option<i32>, stderr: String },

    #[error("unexpected EOF from MCP server")]
    UnexpectedEof,

    #[error("MCP error: {message} (code: {})", code_label(.code))]
    Protocol { code: Option<i64>, message: String },

    #[error("invalid MCP response: {0}")]
    MalformedResponse(String),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("MCP client is closed")]
    Closed,
}

fn code_label(code: &Option<i64>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl McpError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Startup { .. } => "startup",
            McpError::Send(_) => "send",
            McpError::Receive(_) => "receive",
            McpError::Timeout(_) => "timeout",
            McpError::ProcessExited { .. } => "process_exited",
            McpError::UnexpectedEof => "eof",
            McpError::Protocol { .. } => "protocol",
            McpError::MalformedResponse(_) => "malformed",
            McpError::Encode(_) => "encode",
            McpError::Closed => "closed",
        }
    }
}
