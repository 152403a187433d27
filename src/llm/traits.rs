//! LLM 客户端抽象
//!
//! 规划适配器只依赖 LlmClient：OpenAI 兼容端点与测试用 Mock 都实现它。

use async_trait::async_trait;
use thiserror::Error;

use super::message::Message;

/// LLM 调用失败（传输层）；内容解析失败不在此列，由规划适配器降级处理
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("empty response")]
    EmptyResponse,
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
