//! MCP stdio client for launching external tool servers and calling their tools.

mod transport;

pub use transport::Transport;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// How long a server that closed its stdout gets to report an exit status.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Configuration for a stdio MCP server process.
#[derive(Debug, Clone)]
pub struct StdioServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub tool_timeout: Duration,
}

/// Metadata returned by an MCP server for one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Normalized result returned from an MCP tool call.
#[derive(Debug, Clone)]
pub struct McpToolCallResult {
    pub text: String,
    pub structured_content: Option<Value>,
    pub raw_content: Vec<Value>,
    pub is_error: bool,
}

/// stdio-backed MCP client owning one server process.
#[derive(Debug)]
pub struct McpClient {
    name: String,
    pid: Option<u32>,
    child: Mutex<Child>,
    io: Mutex<Connection>,
    closed: AtomicBool,
}

#[derive(Debug)]
struct Connection {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_request_id: u64,
    tool_timeout: Duration,
}

/// Errors returned by the MCP client.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP server '{server}' executable not found: {command}")]
    ExecutableNotFound { server: String, command: String },
    #[error("Failed to spawn MCP server '{server}': {message}")]
    Spawn { server: String, message: String },
    #[error("MCP server '{server}' exited during startup ({status})")]
    ProcessExited {
        server: String,
        code: Option<i32>,
        status: String,
    },
    #[error("MCP server '{0}' closed the stdio connection")]
    ConnectionClosed(String),
    #[error("MCP server '{server}' returned protocol error {code}: {message}")]
    ServerError {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' sent invalid response: {message}")]
    InvalidResponse { server: String, message: String },
    #[error("MCP request to server '{server}' timed out after {timeout:?}")]
    Timeout { server: String, timeout: Duration },
    #[error("MCP server '{0}' has been closed")]
    Closed(String),
    #[error("IO error while talking to MCP server '{server}': {message}")]
    Io { server: String, message: String },
    #[error("JSON error while talking to MCP server '{server}': {message}")]
    Json { server: String, message: String },
}

impl McpClient {
    /// Spawn a stdio MCP server, initialize it, and return discovered tools.
    ///
    /// The whole handshake runs under `config.startup_timeout`. When any step
    /// after the spawn fails the process is killed before the error is
    /// returned.
    pub async fn connect(
        config: StdioServerConfig,
    ) -> Result<(Self, Vec<McpToolInfo>), McpError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => McpError::ExecutableNotFound {
                server: config.name.clone(),
                command: config.command.clone(),
            },
            _ => McpError::Spawn {
                server: config.name.clone(),
                message: err.to_string(),
            },
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill().await;
            return Err(McpError::Spawn {
                server: config.name.clone(),
                message: "child stdio was not piped".to_string(),
            });
        };
        if let Some(stderr) = child.stderr.take() {
            let server_name = config.name.clone();
            tokio::spawn(async move {
                let mut stderr = BufReader::new(stderr);
                let mut line = String::new();
                loop {
                    line.clear();
                    match stderr.read_line(&mut line).await {
                        Ok(0) => break,
                        Ok(_) => {
                            tracing::debug!(server = %server_name, stderr = line.trim_end(), "mcp stderr");
                        }
                        Err(err) => {
                            tracing::debug!(server = %server_name, error = %err, "failed to read mcp stderr");
                            break;
                        }
                    }
                }
            });
        }

        let pid = child.id();
        tracing::debug!(server = %config.name, pid, command = %config.command, "spawned mcp server");

        let client = Self {
            name: config.name.clone(),
            pid,
            child: Mutex::new(child),
            io: Mutex::new(Connection {
                stdin,
                stdout: BufReader::new(stdout),
                next_request_id: 1,
                tool_timeout: config.tool_timeout,
            }),
            closed: AtomicBool::new(false),
        };

        let startup_timeout = config.startup_timeout;
        let handshake = async {
            client.initialize(startup_timeout).await?;
            client.list_tools(startup_timeout).await
        };
        let outcome = match tokio::time::timeout(startup_timeout, handshake).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout {
                server: client.name.clone(),
                timeout: startup_timeout,
            }),
        };

        match outcome {
            Ok(tools) => {
                tracing::debug!(server = %client.name, tools = tools.len(), "mcp server ready");
                Ok((client, tools))
            }
            Err(err) => {
                let err = client.diagnose_startup_failure(err).await;
                client.close().await;
                Err(err)
            }
        }
    }

    /// Server name this client was launched under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id of the server, when the platform reports one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether [`McpClient::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Call one tool on the connected MCP server.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<McpToolCallResult, McpError> {
        let timeout = {
            let conn = self.io.lock().await;
            conn.tool_timeout
        };
        let result = match self
            .request_with_timeout(
                "tools/call",
                serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                }),
                timeout,
            )
            .await
        {
            Ok(result) => result,
            Err(err @ McpError::Timeout { .. }) => {
                // A partly read reply would corrupt every later response.
                tracing::warn!(server = %self.name, tool = name, "tool call timed out, closing server");
                self.close().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let content = result
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let structured_content = result.get("structuredContent").cloned();
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(McpToolCallResult {
            text: render_content_text(&content, structured_content.as_ref()),
            structured_content,
            raw_content: content,
            is_error,
        })
    }

    /// Kill the server process and wait for it to exit. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut child = self.child.lock().await;
        if let Err(err) = child.kill().await {
            // Already reaped processes refuse a second kill.
            tracing::debug!(server = %self.name, error = %err, "mcp server kill failed");
        }
        tracing::debug!(server = %self.name, "closed mcp server");
    }

    async fn initialize(&self, timeout: Duration) -> Result<(), McpError> {
        let _ = self
            .request_with_timeout(
                "initialize",
                serde_json::json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "toolhub",
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
                timeout,
            )
            .await?;
        self.notify("notifications/initialized", serde_json::json!({}))
            .await
    }

    async fn list_tools(&self, timeout: Duration) -> Result<Vec<McpToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => serde_json::json!({ "cursor": cursor }),
                None => serde_json::json!({}),
            };
            let result = self.request_with_timeout("tools/list", params, timeout).await?;
            let listed = result
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| McpError::InvalidResponse {
                    server: self.name.clone(),
                    message: "tools/list result missing tools array".to_string(),
                })?;

            for tool in listed {
                tools.push(parse_tool_info(&self.name, tool)?);
            }

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            if cursor.is_none() {
                break;
            }
        }

        Ok(tools)
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), McpError> {
        self.ensure_open()?;
        let mut conn = self.io.lock().await;
        write_message(
            &mut conn.stdin,
            &self.name,
            &serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            }),
        )
        .await
    }

    async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        self.ensure_open()?;
        let mut conn = self.io.lock().await;
        let request_id = conn.next_request_id;
        conn.next_request_id += 1;
        write_message(
            &mut conn.stdin,
            &self.name,
            &serde_json::json!({
                "jsonrpc": "2.0",
                "id": request_id,
                "method": method,
                "params": params,
            }),
        )
        .await?;

        tokio::time::timeout(timeout, conn.await_response(&self.name, request_id))
            .await
            .map_err(|_| McpError::Timeout {
                server: self.name.clone(),
                timeout,
            })?
    }

    fn ensure_open(&self) -> Result<(), McpError> {
        if self.is_closed() {
            return Err(McpError::Closed(self.name.clone()));
        }
        Ok(())
    }

    /// Turns a broken pipe during startup into an exit report when the
    /// process has actually terminated.
    async fn diagnose_startup_failure(&self, err: McpError) -> McpError {
        if !matches!(err, McpError::ConnectionClosed(_) | McpError::Io { .. }) {
            return err;
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => McpError::ProcessExited {
                server: self.name.clone(),
                code: status.code(),
                status: status.to_string(),
            },
            _ => err,
        }
    }
}

impl Connection {
    async fn await_response(&mut self, server_name: &str, request_id: u64) -> Result<Value, McpError> {
        loop {
            let message = read_message(&mut self.stdout, server_name).await?;

            if let Some(method) = message.get("method").and_then(Value::as_str) {
                if let Some(id) = message.get("id").cloned() {
                    write_message(
                        &mut self.stdin,
                        server_name,
                        &serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {
                                "code": -32601,
                                "message": format!("toolhub does not implement MCP client method '{method}'"),
                            }
                        }),
                    )
                    .await?;
                }
                continue;
            }

            let response_id = message.get("id").and_then(Value::as_u64);
            if response_id != Some(request_id) {
                continue;
            }

            if let Some(err) = message.get("error") {
                return Err(McpError::ServerError {
                    server: server_name.to_string(),
                    code: err.get("code").and_then(Value::as_i64).unwrap_or(-32000),
                    message: err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
            }

            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

#[async_trait]
impl Transport for McpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<McpToolCallResult, McpError> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn close(&self) {
        McpClient::close(self).await;
    }

    fn is_closed(&self) -> bool {
        McpClient::is_closed(self)
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            let _ = self.child.get_mut().start_kill();
        }
    }
}

async fn write_message(
    stdin: &mut ChildStdin,
    server_name: &str,
    message: &Value,
) -> Result<(), McpError> {
    let mut payload = serde_json::to_vec(message).map_err(|err| McpError::Json {
        server: server_name.to_string(),
        message: err.to_string(),
    })?;
    payload.push(b'\n');
    stdin.write_all(&payload).await.map_err(|err| McpError::Io {
        server: server_name.to_string(),
        message: err.to_string(),
    })?;
    stdin.flush().await.map_err(|err| McpError::Io {
        server: server_name.to_string(),
        message: err.to_string(),
    })
}

async fn read_message(
    stdout: &mut BufReader<ChildStdout>,
    server_name: &str,
) -> Result<Value, McpError> {
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = stdout
            .read_line(&mut line)
            .await
            .map_err(|err| McpError::Io {
                server: server_name.to_string(),
                message: err.to_string(),
            })?;
        if bytes == 0 {
            return Err(McpError::ConnectionClosed(server_name.to_string()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed).map_err(|err| McpError::Json {
            server: server_name.to_string(),
            message: err.to_string(),
        });
    }
}

fn parse_tool_info(server_name: &str, value: &Value) -> Result<McpToolInfo, McpError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidResponse {
            server: server_name.to_string(),
            message: "tool entry missing name".to_string(),
        })?;
    let input_schema = value
        .get("inputSchema")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type":"object","additionalProperties":true}));
    Ok(McpToolInfo {
        name: name.to_string(),
        description: value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("MCP tool")
            .to_string(),
        input_schema,
    })
}

fn render_content_text(content: &[Value], structured_content: Option<&Value>) -> String {
    let mut parts = Vec::new();
    for item in content {
        match item.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    parts.push(text.to_string());
                }
            }
            Some("resource") => {
                if let Some(text) = item
                    .get("resource")
                    .and_then(|v| v.get("text"))
                    .and_then(Value::as_str)
                {
                    parts.push(text.to_string());
                } else {
                    parts.push("[resource content omitted]".to_string());
                }
            }
            Some(kind) => parts.push(format!("[{kind} content omitted]")),
            None => {}
        }
    }

    if parts.is_empty() {
        if let Some(structured_content) = structured_content {
            return serde_json::to_string_pretty(structured_content)
                .unwrap_or_else(|_| structured_content.to_string());
        }
        return "(no output)".to_string();
    }

    parts.join("\n")
}
