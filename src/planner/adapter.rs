//! 规划适配器
//!
//! 把用户原文与工具目录交给 LLM，解析出单个工具调用计划。
//! LLM 调用本身失败返回 Err(LlmError)；模型输出无法解析时降级为 tool=null 的 Plan，不返回错误。

use std::sync::Arc;

use serde_json::json;

use super::plan::{parse_plan, Plan};
use super::schema::plan_schema_json;
use crate::llm::{LlmClient, LlmError, Message};
use crate::tools::Tool;

const INSTRUCTIONS: &str = "You convert natural language requests into MCP tool invocations.\n\
Return ONLY a strict JSON object with fields: tool, arguments, summary, confirmation_prompt.\n\
If no suitable tool exists, set tool=null and arguments={}. Do not invent tools.\n\
Use the provided parameter schemas when forming arguments.";

pub struct PlannerAdapter {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl PlannerAdapter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        let system_prompt = format!(
            "{}\n\nAnswer JSON Schema:\n{}",
            INSTRUCTIONS,
            plan_schema_json()
        );
        Self { llm, system_prompt }
    }

    pub async fn plan(&self, user_text: &str, catalog: &[Tool]) -> Result<Plan, LlmError> {
        let request = json!({
            "available_tools": catalog,
            "user_request": user_text,
        });
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(request.to_string()),
        ];

        let output = self.llm.complete(&messages).await?;
        let (prompt, completion, total) = self.llm.token_usage();
        tracing::debug!(prompt, completion, total, "Planner token usage");

        Ok(parse_plan(&output))
    }
}
