//! toolhub-tools: the tool abstraction handed to agent loops, and adapters
//! exposing tool-server transports through it.

mod error;
mod mcp;
pub mod registry;
pub mod traits;

pub use error::ToolError;
pub use mcp::{register_transport_tools, TransportTool};
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolResult};
