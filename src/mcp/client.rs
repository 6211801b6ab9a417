// src/mcp/client.rs
//! Line-delimited JSON-RPC client for a tool server on the other end of a
//! pipe: either a child process we spawn, or our own stdin/stdout when the
//! host has already attached one.

use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::mcp::envelope::{
    classify, envelope_id, into_result, Accumulator, Incoming, Notification, Request,
    ToolCallParams, JSONRPC_VERSION,
};
use crate::mcp::error::{McpError, Result};

pub const PROTOCOL_VERSION: &str = "2025-03-26";

const STDERR_TAIL_BYTES: usize = 8 * 1024;
const CLOSE_GRACE: Duration = Duration::from_secs(5);
const EXIT_GRACE: Duration = Duration::from_millis(500);
const LOG_PREVIEW_CHARS: usize = 500;

type Reader = Box<dyn AsyncBufRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Arguments of the `search_web` tool. Unset optionals are omitted on the
/// wire, never sent as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchWebParams {
    pub query: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engines: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safesearch: Option<String>,
}

impl SearchWebParams {
    pub fn new(query: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category: category.into(),
            engines: None,
            time_range: None,
            safesearch: None,
        }
    }

    pub fn time_range(mut self, range: impl Into<String>) -> Self {
        self.time_range = Some(range.into());
        self
    }

    pub fn engines(mut self, engines: impl Into<String>) -> Self {
        self.engines = Some(engines.into());
        self
    }
}

pub struct McpClient {
    reader: Reader,
    writer: Option<Writer>,
    child: Option<Child>,
    stderr_tail: Arc<Mutex<String>>,
    stderr_task: Option<JoinHandle<()>>,
    timeout: Duration,
    next_id: u64,
    strict_ids: bool,
    /// Bytes of a line not yet terminated; survives a timed-out call.
    pending: Vec<u8>,
    acc: Accumulator,
}

impl McpClient {
    /// Spawn `argv` with piped stdio. Must be called inside a Tokio runtime.
    pub fn spawn(argv: &[String], timeout: Duration) -> Result<Self> {
        let command = argv.join(" ");
        let (program, args) = argv.split_first().ok_or_else(|| McpError::Startup {
            command: command.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Startup {
                command: command.clone(),
                source,
            })?;

        let missing = |what: &str| McpError::Startup {
            command: command.clone(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, format!("no {what} pipe")),
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain_stderr(err, stderr_tail.clone())));

        debug!(target: "mcp", %command, pid = ?child.id(), "spawned MCP server");

        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            writer: Some(Box::new(stdin)),
            child: Some(child),
            stderr_tail,
            stderr_task,
            timeout,
            next_id: 1,
            strict_ids: false,
            pending: Vec::new(),
            acc: Accumulator::default(),
        })
    }

    /// Talk over this process's own stdin/stdout.
    pub fn attach_stdio(timeout: Duration) -> Self {
        Self::from_streams(tokio::io::stdin(), tokio::io::stdout(), timeout)
    }

    /// Talk over arbitrary streams (pipes, duplex halves in tests).
    pub fn from_streams<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Some(Box::new(writer)),
            child: None,
            stderr_tail: Arc::new(Mutex::new(String::new())),
            stderr_task: None,
            timeout,
            next_id: 1,
            strict_ids: false,
            pending: Vec::new(),
            acc: Accumulator::default(),
        }
    }

    /// Only accept answers whose `id` matches the pending request.
    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }

    pub fn set_strict_ids(&mut self, strict: bool) {
        self.strict_ids = strict;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// `initialize` request followed by the `notifications/initialized` event.
    pub async fn initialize(&mut self, client_name: &str, version: &str) -> Result<Value> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": client_name, "version": version },
        });
        let info = self.request("initialize", params).await?;
        self.notify("notifications/initialized", json!({})).await?;
        Ok(info)
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        self.request("tools/call", ToolCallParams { name, arguments })
            .await
    }

    pub async fn search_web(&mut self, params: &SearchWebParams) -> Result<Value> {
        let arguments = serde_json::to_value(params)?;
        self.call_tool("search_web", arguments).await
    }

    pub async fn fetch_page(&mut self, url: &str) -> Result<Value> {
        self.call_tool("get_website", json!({ "url": url })).await
    }

    /// One request/response cycle. The timeout is measured from here.
    pub async fn request<P: Serialize>(&mut self, method: &str, params: P) -> Result<Value> {
        crate::metrics::ensure_described();
        let deadline = Instant::now() + self.timeout;
        let id = self.next_id;
        self.next_id += 1;
        counter!("mcp_requests_total").increment(1);

        let req = Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };
        let outcome = match self.send_line(&req).await {
            Ok(()) => self.read_answer(id, deadline).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            counter!("mcp_errors_total", "kind" => e.kind()).increment(1);
            debug!(target: "mcp", %method, id, error = %e, "request failed");
        }
        outcome
    }

    pub async fn notify<P: Serialize>(&mut self, method: &str, params: P) -> Result<()> {
        let note = Notification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        };
        self.send_line(&note).await
    }

    /// Close stdin, give the child a grace period, then kill it. Idempotent.
    pub async fn close(&mut self) {
        let Some(mut child) = self.child.take() else {
            self.writer = None;
            return;
        };
        if let Some(mut w) = self.writer.take() {
            let _ = w.shutdown().await;
        }
        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(target: "mcp", ?status, "MCP server exited"),
            Ok(Err(e)) => debug!(target: "mcp", error = %e, "waiting for MCP server failed"),
            Err(_) => {
                warn!(target: "mcp", "MCP server ignored stdin close; killing");
                let _ = child.kill().await;
            }
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }

    /// Captured tail of the child's standard error.
    pub fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    async fn send_line<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        let mut line = serde_json::to_string(msg)?;
        debug!(target: "mcp", line = %preview(&line), "send");
        line.push('\n');
        let writer = self.writer.as_mut().ok_or(McpError::Closed)?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(McpError::Send)?;
        writer.flush().await.map_err(McpError::Send)
    }

    async fn read_answer(&mut self, id: u64, deadline: Instant) -> Result<Value> {
        loop {
            let read = tokio::time::timeout_at(
                deadline,
                self.reader.read_until(b'\n', &mut self.pending),
            )
            .await;
            let n = match read {
                Err(_) => return Err(McpError::Timeout(self.timeout)),
                Ok(Err(e)) => return Err(McpError::Receive(e)),
                Ok(Ok(n)) => n,
            };
            if n == 0 && self.pending.is_empty() {
                return Err(self.eof_error().await);
            }

            let raw = std::mem::take(&mut self.pending);
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            debug!(target: "mcp", line = %preview(line), "recv");

            let Some(value) = self.acc.feed(line) else {
                continue;
            };
            match classify(value) {
                Incoming::Notification { method } => {
                    counter!("mcp_notifications_skipped_total").increment(1);
                    debug!(target: "mcp", %method, "skipping notification");
                }
                Incoming::Answer(map) => {
                    if self.strict_ids && envelope_id(&map) != Some(id) {
                        warn!(target: "mcp", expected = id, got = ?map.get("id"), "skipping answer with foreign id");
                        continue;
                    }
                    return into_result(map);
                }
                Incoming::Bare { id: got } => {
                    if got.as_ref().and_then(Value::as_u64) == Some(id) {
                        return Err(McpError::MalformedResponse(
                            "envelope has neither 'result' nor 'error'".into(),
                        ));
                    }
                    debug!(target: "mcp", got = ?got, "skipping bare envelope");
                }
                Incoming::Other => debug!(target: "mcp", "skipping non-object line"),
            }
        }
    }

    async fn eof_error(&mut self) -> McpError {
        let Some(child) = self.child.as_mut() else {
            return McpError::UnexpectedEof;
        };
        let status = match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => status,
            _ => return McpError::UnexpectedEof,
        };
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(EXIT_GRACE, task).await;
        }
        McpError::ProcessExited {
            status: status.code(),
            stderr: self.stderr_tail().trim().to_string(),
        }
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

async fn drain_stderr<R: AsyncRead + Unpin>(mut stderr: R, tail: Arc<Mutex<String>>) {
    let mut buf = [0u8; 1024];
    loop {
        let n = match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let chunk = String::from_utf8_lossy(&buf[..n]);
        let mut t = tail.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        t.push_str(&chunk);
        if t.len() > STDERR_TAIL_BYTES {
            let mut cut = t.len() - STDERR_TAIL_BYTES;
            while !t.is_char_boundary(cut) {
                cut += 1;
            }
            t.drain(..cut);
        }
    }
}

fn preview(s: &str) -> String {
    crate::ingest::truncate_chars(s, LOG_PREVIEW_CHARS)
}
