//! 网关错误类型
//!
//! 会话层只对这些显式变体做模式匹配；除 CatalogFetch 外都可在会话内恢复（回一条 error 信封后继续）。

use thiserror::Error;

use crate::llm::LlmError;
use crate::tools::BackendError;

/// 网关运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 会话启动时拉取工具目录失败：会话无法建立
    #[error("Failed to fetch tool catalog: {0}")]
    CatalogFetch(#[source] BackendError),

    #[error("LLM error: {0}")]
    Planning(#[from] LlmError),

    #[error("Execution failed: {0}")]
    Execution(#[source] BackendError),

    #[error("Malformed message: {0}")]
    MalformedInput(String),

    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("Failed to bind {0}")]
    Bind(String),

    #[error("Config error: {0}")]
    Config(String),
}
