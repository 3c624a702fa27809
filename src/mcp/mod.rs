//! Model Context Protocol (MCP) server surface of the bridge.
//!
//! The server speaks newline-delimited JSON-RPC 2.0 on stdio and advertises
//! the `tools` capability. Tool calls are dispatched through `lsp::LspProvider`
//! onto the configured language servers.

pub mod logging;
pub mod lsp;
pub mod server;
pub mod types;

pub use server::McpServer;
pub use types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpTool};
