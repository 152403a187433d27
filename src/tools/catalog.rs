//! 工具目录客户端
//!
//! 会话启动时调用一次 list()：把后端的原始描述规整为 Tool（名称非空且唯一，schema 缺省为空对象）。

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::backend::{BackendError, ToolBackend};

/// 可调用的工具；序列化形态即提供给规划器的目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "parameters", alias = "inputSchema", default = "empty_schema")]
    pub argument_schema: Value,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

impl Tool {
    /// 从原始描述构造；缺少名称时返回 None
    pub fn from_descriptor(raw: &Value) -> Option<Self> {
        let name = raw.get("name").and_then(Value::as_str)?.trim();
        if name.is_empty() {
            return None;
        }
        let description = raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let argument_schema = raw
            .get("inputSchema")
            .or_else(|| raw.get("parameters"))
            .filter(|s| !s.is_null())
            .cloned()
            .unwrap_or_else(empty_schema);
        Some(Self {
            name: name.to_string(),
            description,
            argument_schema,
        })
    }
}

/// 工具目录客户端
#[derive(Clone)]
pub struct ToolCatalogClient {
    backend: Arc<dyn ToolBackend>,
}

impl ToolCatalogClient {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// 拉取并规整工具目录，保持后端给出的顺序
    pub async fn list(&self) -> Result<Vec<Tool>, BackendError> {
        let raw = self.backend.list_tools().await?;
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(raw.len());
        for descriptor in &raw {
            match Tool::from_descriptor(descriptor) {
                Some(tool) if seen.insert(tool.name.clone()) => tools.push(tool),
                Some(tool) => tracing::warn!(tool = %tool.name, "Duplicate tool name in catalog, skipped"),
                None => tracing::warn!("Tool descriptor without a name, skipped"),
            }
        }
        tracing::debug!(count = tools.len(), "Tool catalog fetched");
        Ok(tools)
    }
}
