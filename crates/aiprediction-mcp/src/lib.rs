//! AI Prediction MCP - Model Context Protocol surface
//!
//! This crate exposes the prediction API to MCP clients:
//! - JSON-RPC 2.0 message handling
//! - Tool catalog and execution
//! - Resource catalog and reads
//! - Newline-delimited stdio transport

pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

pub use protocol::RpcError;
pub use resources::{ResourceDefinition, CURRENT_DATE_URI, DEBUG_INFO_URI};
pub use server::{McpServer, SERVER_NAME};
pub use tools::{ToolDefinition, ToolExecutor, ToolOutput};
