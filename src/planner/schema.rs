//! 规划答案的 JSON Schema（schemars 自动生成），拼入 system prompt 以约束模型输出格式

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 规划答案格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanFormat {
    /// 目录中的工具名；没有合适工具时为 null
    pub tool: Option<String>,
    /// 工具参数，遵循该工具的参数 schema
    pub arguments: HashMap<String, serde_json::Value>,
    /// 一句话描述将要执行的动作
    pub summary: String,
    /// 向用户确认时展示的问题
    pub confirmation_prompt: String,
}

pub fn plan_schema_json() -> String {
    let schema = schema_for!(PlanFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
