//! Tools backed by a live tool-server transport.

use crate::error::ToolError;
use crate::registry::ToolRegistry;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use toolhub_mcp::{McpError, McpToolInfo, Transport};

/// A tool advertised by a tool server, executed through its transport.
pub struct TransportTool {
    name: String,
    label: String,
    origin: String,
    description: String,
    input_schema: Value,
    transport: Arc<dyn Transport>,
}

impl TransportTool {
    /// Wrap one advertised tool. `origin` names the server instance the tool
    /// came from and shows up in labels and result metadata.
    pub fn new(origin: &str, info: McpToolInfo, transport: Arc<dyn Transport>) -> Self {
        Self {
            label: format!("{origin}: {}", info.name),
            name: info.name,
            origin: origin.to_string(),
            description: info.description,
            input_schema: info.input_schema,
            transport,
        }
    }
}

#[async_trait]
impl Tool for TransportTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let result = self
            .transport
            .call_tool(&self.name, args)
            .await
            .map_err(map_mcp_error)?;
        Ok(ToolResult {
            output: result.text,
            metadata: serde_json::json!({
                "tool_type": "mcp",
                "server": self.origin,
                "structured_content": result.structured_content,
                "raw_content": result.raw_content,
            }),
            is_error: result.is_error,
        })
    }
}

/// Register every tool a transport advertises.
///
/// Names already present in `registry` keep their first owner; the skipped
/// names are returned so the caller can report them.
pub fn register_transport_tools(
    registry: &mut ToolRegistry,
    origin: &str,
    transport: Arc<dyn Transport>,
    tools: Vec<McpToolInfo>,
) -> Vec<String> {
    let mut skipped = Vec::new();
    for info in tools {
        let name = info.name.clone();
        let tool = TransportTool::new(origin, info, Arc::clone(&transport));
        if !registry.try_register(Arc::new(tool)) {
            tracing::debug!(origin, tool = %name, "tool name already registered, skipping");
            skipped.push(name);
        }
    }
    skipped
}

fn map_mcp_error(error: McpError) -> ToolError {
    match error {
        McpError::Timeout { .. } => ToolError::Timeout(error.to_string()),
        McpError::Closed(server) => ToolError::Closed(server),
        other => ToolError::ExecutionError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use toolhub_mcp::McpToolCallResult;

    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, Value)>>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Value,
        ) -> Result<McpToolCallResult, McpError> {
            if self.is_closed() {
                return Err(McpError::Closed("recording".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            Ok(McpToolCallResult {
                text: format!("called {name}"),
                structured_content: None,
                raw_content: Vec::new(),
                is_error: false,
            })
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn info(name: &str) -> McpToolInfo {
        McpToolInfo {
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn test_execute_routes_to_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let mut registry = ToolRegistry::new();
        let skipped = register_transport_tools(
            &mut registry,
            "files",
            transport.clone(),
            vec![info("read_file"), info("list_dir")],
        );
        assert!(skipped.is_empty());
        assert_eq!(registry.names(), vec!["list_dir", "read_file"]);

        let tool = registry.get("read_file").unwrap();
        assert_eq!(tool.label(), "files: read_file");
        let result = tool
            .execute(serde_json::json!({"path": "/tmp/a"}))
            .await
            .unwrap();
        assert_eq!(result.output, "called read_file");
        assert_eq!(result.metadata["server"], "files");

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["path"], "/tmp/a");
    }

    #[tokio::test]
    async fn test_colliding_names_keep_first_origin() {
        let first = Arc::new(RecordingTransport::default());
        let second = Arc::new(RecordingTransport::default());
        let mut registry = ToolRegistry::new();

        register_transport_tools(&mut registry, "a", first, vec![info("query")]);
        let skipped = register_transport_tools(
            &mut registry,
            "b",
            second,
            vec![info("query"), info("schema")],
        );

        assert_eq!(skipped, vec!["query"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("query").unwrap().label(), "a: query");
    }

    #[tokio::test]
    async fn test_closed_transport_maps_to_closed_error() {
        let transport = Arc::new(RecordingTransport::default());
        let mut registry = ToolRegistry::new();
        register_transport_tools(&mut registry, "files", transport.clone(), vec![info("read_file")]);
        transport.close().await;

        let err = registry
            .get("read_file")
            .unwrap()
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Closed(_)));
    }
}
