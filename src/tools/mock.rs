//! 内存 Mock 后端（用于测试，无需网络）
//!
//! 固定的工具描述列表 + 按顺序消费的调用结果；记录每一次 call_tool 的参数。
//! 可选的闸门让 call_tool 停在半途，直到测试放行。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use super::backend::{BackendError, ToolBackend, ToolOutput};

#[derive(Debug, Default)]
pub struct MockBackend {
    tools: Vec<Value>,
    list_error: Option<BackendError>,
    outcomes: Mutex<VecDeque<Result<ToolOutput, BackendError>>>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockBackend {
    pub fn new(tools: Vec<Value>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    /// list_tools 始终失败
    pub fn failing_list(mut self, error: BackendError) -> Self {
        self.list_error = Some(error);
        self
    }

    /// 追加一次 call_tool 的结果
    pub fn with_outcome(self, outcome: Result<ToolOutput, BackendError>) -> Self {
        if let Ok(mut q) = self.outcomes.lock() {
            q.push_back(outcome);
        }
        self
    }

    /// 每次 call_tool 记录参数后等待闸门的一个许可（`add_permits` 放行）
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 所有 call_tool 调用（工具名, 参数）
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ToolBackend for MockBackend {
    async fn list_tools(&self) -> Result<Vec<Value>, BackendError> {
        match &self.list_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutput, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((name.to_string(), arguments.clone()));
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.outcomes
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(ToolOutput::Structured(Value::Null)))
    }
}
