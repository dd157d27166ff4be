//! Error types for the toolhub-tools crate.

/// Errors that can occur during tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool is registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backing tool server has been shut down
    #[error("Tool server closed: {0}")]
    Closed(String),
}
