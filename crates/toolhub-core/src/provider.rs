//! Composite tool provider handed to agent loops.

use crate::transport::TransportHandle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use toolhub_tools::{register_transport_tools, ToolError, ToolRegistry, ToolResult};

/// Merged tool catalog over every transport started for one call.
///
/// The provider owns its transports: [`ToolProvider::close`] shuts all of
/// them down, and dropping an unclosed provider kills their processes.
pub struct ToolProvider {
    registry: ToolRegistry,
    transports: Vec<TransportHandle>,
    closed: AtomicBool,
}

impl ToolProvider {
    /// Merge the catalogs of `transports`. On a name collision the tool
    /// registered first is kept.
    pub fn from_transports(transports: Vec<TransportHandle>) -> Self {
        let mut registry = ToolRegistry::new();
        for handle in &transports {
            let skipped = register_transport_tools(
                &mut registry,
                &handle.name,
                Arc::clone(&handle.transport),
                handle.tools.clone(),
            );
            for tool in skipped {
                tracing::warn!(
                    instance_id = %handle.instance_id,
                    server_id = %handle.server_id,
                    tool = %tool,
                    "duplicate tool name, keeping the first server's tool"
                );
            }
        }
        Self {
            registry,
            transports,
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Sorted tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn tool_definitions(&self) -> Vec<serde_json::Value> {
        self.registry.tool_definitions()
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Route a call to the transport that advertised `name`.
    pub async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        if self.is_closed() {
            return Err(ToolError::Closed("tool provider".to_string()));
        }
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    /// Close every transport. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        futures::future::join_all(self.transports.iter().map(|handle| handle.close())).await;
        tracing::debug!(transports = self.transports.len(), "closed tool provider");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProvider")
            .field("tools", &self.registry.names())
            .field("transports", &self.transports)
            .field("closed", &self.is_closed())
            .finish()
    }
}
