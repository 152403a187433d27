//! 工具执行后端抽象
//!
//! 后端只负责两件事：列出工具（原始描述）与按名调用。调用结果在边界处归类为 [`ToolOutput`]，
//! 由执行器统一渲染成可放进信封的 JSON 文档。

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// 后端调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// 不可达、HTTP 非 2xx、超时
    #[error("{0}")]
    Transport(String),

    /// 后端返回的 JSON-RPC error
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// 工具自身报告失败（result.isError = true）
    #[error("{0}")]
    ToolFailed(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// 后端返回的调用结果形态：结构化文档 / 可能是 JSON 的文本 / 仅文本
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Structured(Value),
    JsonText(String),
    Text(String),
}

impl ToolOutput {
    /// 按 结构化 → JSON 文本 → 纯文本 的优先级渲染为 JSON 文档
    ///
    /// JSON 文本只有解析为对象或数组时才展开，`"42"`、`"null"` 这类文本原样保留为字符串。
    pub fn into_document(self) -> Value {
        match self {
            ToolOutput::Structured(value) => value,
            ToolOutput::JsonText(text) => match serde_json::from_str::<Value>(&text) {
                Ok(doc @ (Value::Object(_) | Value::Array(_))) => doc,
                _ => Value::String(text),
            },
            ToolOutput::Text(text) => Value::String(text),
        }
    }

    /// 从 JSON-RPC result 归类
    pub fn from_result(result: Value) -> Self {
        match result {
            Value::Object(_) | Value::Array(_) | Value::Null => ToolOutput::Structured(result),
            Value::String(text) => ToolOutput::JsonText(text),
            other => ToolOutput::Text(other.to_string()),
        }
    }
}

/// 若结果是 `{"isError": true, "content": [...]}`，取出其中的文本作为失败信息
pub fn tool_error_message(result: &Value) -> Option<String> {
    if !result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    if text.is_empty() {
        Some("tool reported an error".to_string())
    } else {
        Some(text)
    }
}

/// 执行后端 trait（MCP JSON-RPC 实现见 [`super::McpBackend`]）
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// 原始工具描述列表（未校验）
    async fn list_tools(&self) -> Result<Vec<Value>, BackendError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolOutput, BackendError>;
}
