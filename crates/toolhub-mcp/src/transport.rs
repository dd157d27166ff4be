//! Transport abstraction over a live tool server.

use crate::{McpError, McpToolCallResult};
use async_trait::async_trait;
use serde_json::Value;

/// A running tool server that can execute tool calls until it is closed.
///
/// Implementations own an external process or channel. `close` must be
/// idempotent and must release the underlying process; every operation
/// after `close` fails with [`McpError::Closed`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Call one tool exposed by the server.
    async fn call_tool(&self, name: &str, arguments: Value)
        -> Result<McpToolCallResult, McpError>;

    /// Terminate the server and release its handles.
    async fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

// Compile-time check: Transport must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn Transport) {}
};
