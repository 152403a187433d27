//! 工具层：目录客户端、执行器与执行后端（MCP JSON-RPC / Mock）

pub mod backend;
pub mod catalog;
pub mod executor;
pub mod mcp;
pub mod mock;

pub use backend::{BackendError, ToolBackend, ToolOutput};
pub use catalog::{Tool, ToolCatalogClient};
pub use executor::ToolExecutor;
pub use mcp::McpBackend;
pub use mock::MockBackend;
