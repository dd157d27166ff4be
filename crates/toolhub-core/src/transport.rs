//! Launching transports from resolved command lines.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use toolhub_mcp::{McpClient, McpError, McpToolInfo, StdioServerConfig, Transport};

fn default_startup_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Time budgets applied to every transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Spawn plus handshake plus tool listing.
    pub startup: Duration,
    /// One tool call.
    pub tool: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            startup: default_startup_timeout(),
            tool: default_tool_timeout(),
        }
    }
}

/// Fully resolved launch request for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub instance_id: String,
    pub server_id: String,
    /// Instance display name; used to label the tools it provides.
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub startup_timeout: Duration,
    pub tool_timeout: Duration,
}

/// A started transport and the tool catalog it advertised.
///
/// Owned by whoever launched it for the duration of one call; never cached.
pub struct TransportHandle {
    pub instance_id: String,
    pub server_id: String,
    pub name: String,
    pub transport: Arc<dyn Transport>,
    pub tools: Vec<McpToolInfo>,
}

impl TransportHandle {
    pub async fn close(&self) {
        self.transport.close().await;
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("instance_id", &self.instance_id)
            .field("server_id", &self.server_id)
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .finish()
    }
}

/// Why a transport could not be created.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Template resolution produced nothing runnable
    #[error("Unusable command: {0}")]
    InvalidCommand(String),

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The server answered, but not with a usable handshake
    #[error("Handshake failed: {0}")]
    Protocol(String),

    /// The process died before the handshake completed
    #[error("Server exited during startup: {0}")]
    Crashed(String),

    #[error("Failed to start server: {0}")]
    Spawn(String),
}

impl From<McpError> for TransportError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ExecutableNotFound { command, .. } => Self::ExecutableNotFound(command),
            McpError::Timeout { timeout, .. } => Self::HandshakeTimeout(timeout),
            McpError::ServerError { .. } | McpError::InvalidResponse { .. } | McpError::Json { .. } => {
                Self::Protocol(err.to_string())
            }
            McpError::ProcessExited { .. } | McpError::ConnectionClosed(_) => {
                Self::Crashed(err.to_string())
            }
            McpError::Spawn { .. } | McpError::Io { .. } | McpError::Closed(_) => {
                Self::Spawn(err.to_string())
            }
        }
    }
}

/// Starts transports. The seam between orchestration and real processes.
#[async_trait]
pub trait TransportLauncher: Send + Sync {
    /// Start a transport and fetch its tool catalog. On failure nothing may
    /// be left running.
    async fn launch(&self, spec: LaunchSpec) -> Result<TransportHandle, TransportError>;
}

/// Launches tool servers as child processes speaking MCP over stdio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdioLauncher {
    cwd: Option<PathBuf>,
}

impl StdioLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Working directory for spawned servers; defaults to the current one.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
        }
    }
}

#[async_trait]
impl TransportLauncher for StdioLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<TransportHandle, TransportError> {
        let (client, tools) = McpClient::connect(StdioServerConfig {
            name: spec.name.clone(),
            command: spec.command,
            args: spec.args,
            env: spec.env.into_iter().collect(),
            cwd: self.cwd.clone(),
            startup_timeout: spec.startup_timeout,
            tool_timeout: spec.tool_timeout,
        })
        .await?;

        Ok(TransportHandle {
            instance_id: spec.instance_id,
            server_id: spec.server_id,
            name: spec.name,
            transport: Arc::new(client),
            tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_errors_map_to_distinct_causes() {
        let not_found: TransportError = McpError::ExecutableNotFound {
            server: "s".to_string(),
            command: "npx".to_string(),
        }
        .into();
        assert!(matches!(not_found, TransportError::ExecutableNotFound(ref c) if c == "npx"));

        let timeout: TransportError = McpError::Timeout {
            server: "s".to_string(),
            timeout: Duration::from_secs(3),
        }
        .into();
        assert!(matches!(timeout, TransportError::HandshakeTimeout(d) if d == Duration::from_secs(3)));

        let protocol: TransportError = McpError::ServerError {
            server: "s".to_string(),
            code: -32600,
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(protocol, TransportError::Protocol(_)));

        let crashed: TransportError = McpError::ProcessExited {
            server: "s".to_string(),
            code: Some(1),
            status: "exit status: 1".to_string(),
        }
        .into();
        assert!(matches!(crashed, TransportError::Crashed(_)));
    }

    #[tokio::test]
    async fn test_stdio_launcher_reports_missing_executable() {
        let err = StdioLauncher::new()
            .launch(LaunchSpec {
                instance_id: "i".to_string(),
                server_id: "s".to_string(),
                name: "missing".to_string(),
                command: "toolhub-definitely-not-installed".to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
                startup_timeout: Duration::from_secs(1),
                tool_timeout: Duration::from_secs(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ExecutableNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_launcher_runs_server_in_cwd() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let workdir = dir.path().join("workdir");
        std::fs::create_dir(&workdir).unwrap();
        // Advertises one tool named after its working directory.
        let script = dir.path().join("cwd-mcp.sh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
read line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-06-18","capabilities":{}}}'
read line
read line
printf '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"%s"}]}}\n' "$(basename "$PWD")"
read line
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let handle = StdioLauncher::with_cwd(&workdir)
            .launch(LaunchSpec {
                instance_id: "i".to_string(),
                server_id: "s".to_string(),
                name: "cwd".to_string(),
                command: script.display().to_string(),
                args: Vec::new(),
                env: BTreeMap::new(),
                startup_timeout: Duration::from_secs(5),
                tool_timeout: Duration::from_secs(5),
            })
            .await
            .unwrap();
        assert_eq!(handle.tools.len(), 1);
        assert_eq!(handle.tools[0].name, "workdir");
        handle.close().await;
    }
}
