//! 工具执行器
//!
//! execute(tool_name, args) 单次委托给后端，不重试；结果渲染为 JSON 文档。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use super::backend::{BackendError, ToolBackend};

/// 工具执行器：持有后端句柄（连接在进程启动时建立，跨会话复用）
#[derive(Clone)]
pub struct ToolExecutor {
    backend: Arc<dyn ToolBackend>,
}

impl ToolExecutor {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// 执行指定工具；成功返回可放进信封的 JSON 文档
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let start = Instant::now();
        let result = self.backend.call_tool(tool_name, arguments).await;

        let (ok, outcome) = match &result {
            Ok(_) => (true, "ok"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(arguments),
        });
        tracing::info!(audit = %audit, "tool");

        result.map(|output| output.into_document())
    }
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
