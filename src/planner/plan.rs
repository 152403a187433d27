//! Plan 与 PendingAction
//!
//! parse_plan 从模型输出中提取 JSON 并宽松解析：字段缺失时取默认值，整体无法解析时降级为 tool=null 的计划。

use serde::Serialize;
use serde_json::{Map, Value};

/// 规划器对一条用户输入给出的答案
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    /// None 表示没有可执行的映射
    pub tool: Option<String>,
    pub arguments: Map<String, Value>,
    pub summary: String,
    pub confirmation_prompt: String,
}

impl Plan {
    /// 模型输出无法解析时的降级计划
    pub fn degraded() -> Self {
        Self {
            tool: None,
            arguments: Map::new(),
            summary: "Failed to parse plan.".to_string(),
            confirmation_prompt: "I couldn't understand the request.".to_string(),
        }
    }

    /// 非空 tool 时生成待确认动作
    pub fn pending_action(&self) -> Option<PendingAction> {
        self.tool.as_ref().map(|tool| PendingAction {
            tool: tool.clone(),
            arguments: self.arguments.clone(),
        })
    }
}

/// 等待用户确认、尚未执行的工具调用；参数在暂存时定格
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAction {
    pub tool: String,
    pub arguments: Map<String, Value>,
}

/// 解析模型输出为 Plan；不会失败
pub fn parse_plan(output: &str) -> Plan {
    let value: Value = match serde_json::from_str(extract_json(output)) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Planner output is not valid JSON");
            return Plan::degraded();
        }
    };
    let Some(obj) = value.as_object() else {
        tracing::warn!("Planner output is not a JSON object");
        return Plan::degraded();
    };

    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
    let arguments = obj
        .get("arguments")
        .or_else(|| obj.get("args"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let text_field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Plan {
        tool,
        arguments,
        summary: text_field(&["summary"]),
        confirmation_prompt: text_field(&["confirmation_prompt", "confirmation"]),
    }
}

/// 提取 JSON 块（```json ... ``` 或首个 { 到末个 }）
fn extract_json(output: &str) -> &str {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}
