//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置的回复；队列耗尽后返回一个 tool=null 的计划。每次调用收到的消息都会被记录。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::message::Message;
use super::traits::{LlmClient, LlmError};

const EXHAUSTED_REPLY: &str =
    r#"{"tool": null, "arguments": {}, "summary": "", "confirmation_prompt": ""}"#;

/// 脚本化 Mock：回复队列 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条成功回复（原样作为模型输出）
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.push(Ok(reply.into()));
        self
    }

    /// 追加一次调用失败
    pub fn with_error(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, reply: Result<String, LlmError>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 最近一次调用的消息
    pub fn last_call(&self) -> Option<Vec<Message>> {
        self.calls.lock().ok().and_then(|c| c.last().cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(EXHAUSTED_REPLY.to_string()))
    }
}
