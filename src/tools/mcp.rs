//! MCP 执行后端：JSON-RPC 2.0 over HTTP
//!
//! `tools/list` 与 `tools/call` 两个方法；reqwest::Client 在进程启动时创建一次并注入，内部连接池跨会话复用。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::backend::{tool_error_message, BackendError, ToolBackend, ToolOutput};
use crate::config::BackendSection;

pub struct McpBackend {
    http: reqwest::Client,
    url: String,
}

impl McpBackend {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// 按 [backend] 配置段创建 HTTP 客户端（超时由客户端施加）
    pub fn from_config(section: &BackendSection) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self::new(http, section.url.clone()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": uuid::Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(BackendError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| error.to_string()),
            });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| BackendError::Decode(format!("missing result in {}", method)))
    }
}

#[async_trait]
impl ToolBackend for McpBackend {
    async fn list_tools(&self) -> Result<Vec<Value>, BackendError> {
        let result = self.rpc("tools/list", json!({})).await?;
        Ok(result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutput, BackendError> {
        let result = self
            .rpc("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        if let Some(message) = tool_error_message(&result) {
            return Err(BackendError::ToolFailed(message));
        }
        Ok(ToolOutput::from_result(result))
    }
}
