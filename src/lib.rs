//! toolchat - 对话式工具网关
//!
//! 用户用自然语言描述意图，规划器将其映射为单个工具调用，经用户明确确认后对执行后端调用一次。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型与优雅关闭
//! - **gateway**: 会话状态机与 WebSocket 入口
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化
//! - **planner**: 计划模型与规划适配器
//! - **tools**: 工具目录、执行器与执行后端（MCP JSON-RPC / Mock）

pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod tools;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::GatewayError;
use crate::gateway::SessionDeps;
use crate::llm::{LlmClient, OpenAiClient};
use crate::planner::PlannerAdapter;
use crate::tools::{McpBackend, ToolBackend, ToolCatalogClient, ToolExecutor};

/// 由配置装配会话依赖：一个执行后端连接（目录客户端与执行器共享）+ 一个规划器
pub fn build_session_deps(cfg: &AppConfig) -> Result<SessionDeps, GatewayError> {
    let backend: Arc<dyn ToolBackend> = Arc::new(
        McpBackend::from_config(&cfg.backend).map_err(|e| GatewayError::Config(e.to_string()))?,
    );
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_config(&cfg.llm));
    Ok(SessionDeps {
        catalog: ToolCatalogClient::new(Arc::clone(&backend)),
        planner: Arc::new(PlannerAdapter::new(llm)),
        executor: ToolExecutor::new(backend),
    })
}
