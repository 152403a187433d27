//! 会话状态机
//!
//! 每个连接一个 Session：AwaitingInput（无待确认动作）与 AwaitingConfirmation（有待确认动作）两态。
//! 入站消息严格逐条处理到底（包括规划 / 执行的往返）后才读取下一条，因此：
//! - 任一时刻至多一个 PendingAction；
//! - 同一会话至多一个进行中的工具执行；
//! - 确认后的动作在执行前即被取出，重复的 "yes" 落入 AwaitingInput 分支重新规划。

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::message::{Envelope, IncomingMessage};
use crate::core::GatewayError;
use crate::planner::{PendingAction, Plan, PlannerAdapter};
use crate::tools::{Tool, ToolCatalogClient, ToolExecutor};

pub type SessionId = String;

/// 出站文案
pub mod texts {
    pub const GREETING: &str =
        "Hi! Tell me what to do. I'll propose an action and ask for confirmation.";
    pub const THINKING: &str = "Thinking…";
    pub const NO_ACTION: &str = "I couldn't map that to a known action. Try rephrasing.";
    pub const EXECUTING: &str = "Executing…";
    pub const DONE: &str = "✅ Done.";
    pub const CANCELLED: &str = "❌ Cancelled. What next?";
    pub const ASK_YES_NO: &str = "Please reply 'yes' or 'no'.";
    pub const INVALID_MESSAGE: &str =
        "Invalid message. Send JSON: { type: 'user', text: '...' }";
    pub const UNSUPPORTED_TYPE: &str = "Unsupported message type.";
}

const AFFIRMATIVE: &[&str] = &["y", "yes", "confirm", "ok", "okay", "do it"];
const NEGATIVE: &[&str] = &["n", "no", "cancel", "stop"];

/// 会话状态（由是否存在待确认动作决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    AwaitingConfirmation,
}

/// 待确认状态下对用户回复的判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Confirm,
    Cancel,
    Unclear,
}

impl Reply {
    pub fn classify(text: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        if AFFIRMATIVE.contains(&normalized.as_str()) {
            Reply::Confirm
        } else if NEGATIVE.contains(&normalized.as_str()) {
            Reply::Cancel
        } else {
            Reply::Unclear
        }
    }
}

/// 会话依赖：进程启动时创建，所有会话共享同一组只读句柄
#[derive(Clone)]
pub struct SessionDeps {
    pub catalog: ToolCatalogClient,
    pub planner: Arc<PlannerAdapter>,
    pub executor: ToolExecutor,
}

/// 单个会话
pub struct Session {
    id: SessionId,
    catalog: Vec<Tool>,
    pending: Option<PendingAction>,
    planner: Arc<PlannerAdapter>,
    executor: ToolExecutor,
    outbox: mpsc::UnboundedSender<Envelope>,
}

impl Session {
    /// 拉取工具目录并发送问候；目录拉取失败则会话不建立
    pub async fn start(
        deps: &SessionDeps,
        outbox: mpsc::UnboundedSender<Envelope>,
    ) -> Result<Self, GatewayError> {
        let id = format!("session_{}", uuid::Uuid::new_v4());
        let catalog = deps
            .catalog
            .list()
            .await
            .map_err(GatewayError::CatalogFetch)?;
        tracing::info!(session = %id, tools = catalog.len(), "Session started");

        let session = Self {
            id,
            catalog,
            pending: None,
            planner: Arc::clone(&deps.planner),
            executor: deps.executor.clone(),
            outbox,
        };
        session.emit(Envelope::bot(texts::GREETING));
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            SessionState::AwaitingConfirmation
        } else {
            SessionState::AwaitingInput
        }
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn catalog(&self) -> &[Tool] {
        &self.catalog
    }

    /// 逐条消费入站帧直到通道结束或出站端断开
    pub async fn run<S>(mut self, inbound: S)
    where
        S: Stream<Item = String>,
    {
        let mut inbound = std::pin::pin!(inbound);
        while let Some(raw) = inbound.next().await {
            self.handle(&raw).await;
            if self.outbox.is_closed() {
                break;
            }
        }
        tracing::info!(session = %self.id, "Session closed");
    }

    /// 处理一条原始入站帧
    pub async fn handle(&mut self, raw: &str) {
        let text = match IncomingMessage::parse_user_text(raw) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(session = %self.id, error = %e, "Rejected inbound frame");
                let reply = match e {
                    GatewayError::UnsupportedType(_) => texts::UNSUPPORTED_TYPE,
                    _ => texts::INVALID_MESSAGE,
                };
                self.emit(Envelope::error(reply));
                return;
            }
        };

        match self.state() {
            SessionState::AwaitingInput => self.handle_request(text.trim()).await,
            SessionState::AwaitingConfirmation => self.handle_reply(&text).await,
        }
    }

    async fn handle_request(&mut self, text: &str) {
        self.emit(Envelope::bot(texts::THINKING));

        let plan = match self.planner.plan(text, &self.catalog).await {
            Ok(plan) => plan,
            Err(e) => {
                let err = GatewayError::from(e);
                tracing::warn!(session = %self.id, error = %err, "Planning failed");
                self.emit(Envelope::error(err.to_string()));
                return;
            }
        };

        let Some(action) = plan.pending_action() else {
            tracing::debug!(session = %self.id, summary = %plan.summary, "No actionable plan");
            self.emit(Envelope::bot(texts::NO_ACTION));
            return;
        };

        tracing::info!(session = %self.id, tool = %action.tool, "Action staged for confirmation");
        self.emit(Envelope::confirm(
            confirm_text(&plan, &action),
            json!({"tool": action.tool, "arguments": action.arguments}),
        ));
        self.pending = Some(action);
    }

    async fn handle_reply(&mut self, text: &str) {
        match Reply::classify(text) {
            Reply::Confirm => {
                let Some(action) = self.pending.take() else {
                    return;
                };
                self.emit(Envelope::bot(texts::EXECUTING));
                match self.executor.execute(&action.tool, &action.arguments).await {
                    Ok(result) => self.emit(Envelope::result(texts::DONE, result)),
                    Err(e) => {
                        let err = GatewayError::Execution(e);
                        tracing::warn!(session = %self.id, tool = %action.tool, error = %err, "Tool execution failed");
                        self.emit(Envelope::error(format!("❌ {}", err)));
                    }
                }
            }
            Reply::Cancel => {
                self.pending = None;
                self.emit(Envelope::bot(texts::CANCELLED));
            }
            Reply::Unclear => self.emit(Envelope::bot(texts::ASK_YES_NO)),
        }
    }

    /// 连接已断开时丢弃
    fn emit(&self, envelope: Envelope) {
        if self.outbox.send(envelope).is_err() {
            tracing::debug!(session = %self.id, "Outbox closed, envelope discarded");
        }
    }
}

fn confirm_text(plan: &Plan, action: &PendingAction) -> String {
    format!(
        "{}\n\n{}\n\nTool: {}\nArgs: {}\n\nType 'yes' to proceed or 'no' to cancel.",
        plan.summary,
        plan.confirmation_prompt,
        action.tool,
        Value::Object(action.arguments.clone())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::EnvelopeKind;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::tools::{BackendError, MockBackend, ToolOutput};
    use futures_util::{stream, StreamExt};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    const RESTART_PLAN: &str = r#"{"tool":"restart_service","arguments":{"name":"foo"},"summary":"Restart foo","confirmation_prompt":"Restart the foo service now?"}"#;
    const NULL_PLAN: &str =
        r#"{"tool":null,"arguments":{},"summary":"nothing","confirmation_prompt":""}"#;

    struct Harness {
        session: Session,
        rx: mpsc::UnboundedReceiver<Envelope>,
        llm: Arc<MockLlmClient>,
        backend: Arc<MockBackend>,
    }

    impl Harness {
        async fn new(llm: MockLlmClient, backend: MockBackend) -> Self {
            let llm = Arc::new(llm);
            let backend = Arc::new(backend);
            let deps = SessionDeps {
                catalog: ToolCatalogClient::new(backend.clone()),
                planner: Arc::new(PlannerAdapter::new(llm.clone())),
                executor: ToolExecutor::new(backend.clone()),
            };
            let (tx, mut rx) = mpsc::unbounded_channel();
            let session = Session::start(&deps, tx).await.unwrap();
            let greeting = rx.try_recv().unwrap();
            assert_eq!(greeting, Envelope::bot(texts::GREETING));
            Self {
                session,
                rx,
                llm,
                backend,
            }
        }

        async fn send(&mut self, text: &str) -> Vec<Envelope> {
            let raw = json!({"type": "user", "text": text}).to_string();
            self.send_raw(&raw).await
        }

        async fn send_raw(&mut self, raw: &str) -> Vec<Envelope> {
            self.session.handle(raw).await;
            let mut out = Vec::new();
            while let Ok(env) = self.rx.try_recv() {
                out.push(env);
            }
            out
        }

        fn assert_invariant(&self) {
            assert_eq!(
                self.session.state() == SessionState::AwaitingConfirmation,
                self.session.pending_action().is_some()
            );
        }
    }

    fn catalog() -> Vec<Value> {
        vec![json!({"name": "restart_service", "description": "Restart a service",
                     "inputSchema": {"type": "object"}})]
    }

    async fn staged(backend: MockBackend) -> Harness {
        let mut h = Harness::new(MockLlmClient::new().with_reply(RESTART_PLAN), backend).await;
        h.send("restart service foo").await;
        assert_eq!(h.session.state(), SessionState::AwaitingConfirmation);
        h
    }

    #[test]
    fn test_reply_classification() {
        for t in ["y", "YES", "  confirm ", "Ok", "okay", "Do It"] {
            assert_eq!(Reply::classify(t), Reply::Confirm, "{t}");
        }
        for t in ["n", "No", "cancel", " STOP"] {
            assert_eq!(Reply::classify(t), Reply::Cancel, "{t}");
        }
        for t in ["maybe", "yes please", "", "nope"] {
            assert_eq!(Reply::classify(t), Reply::Unclear, "{t}");
        }
    }

    #[tokio::test]
    async fn test_start_fetches_catalog_and_greets() {
        let h = Harness::new(MockLlmClient::new(), MockBackend::new(catalog())).await;
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
        assert_eq!(h.session.catalog().len(), 1);
        assert!(h.session.id().starts_with("session_"));
    }

    #[tokio::test]
    async fn test_start_fails_without_catalog() {
        let backend = Arc::new(
            MockBackend::new(vec![]).failing_list(BackendError::Transport("refused".into())),
        );
        let deps = SessionDeps {
            catalog: ToolCatalogClient::new(backend.clone()),
            planner: Arc::new(PlannerAdapter::new(Arc::new(MockLlmClient::new()))),
            executor: ToolExecutor::new(backend),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = Session::start(&deps, tx).await.err().unwrap();
        assert!(matches!(err, GatewayError::CatalogFetch(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_request_stages_confirmation() {
        let mut h = Harness::new(
            MockLlmClient::new().with_reply(RESTART_PLAN),
            MockBackend::new(catalog()),
        )
        .await;

        let out = h.send("restart service foo").await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Envelope::bot(texts::THINKING));
        assert_eq!(out[1].kind, EnvelopeKind::Confirm);
        assert_eq!(
            out[1].payload,
            Some(json!({"tool": "restart_service", "arguments": {"name": "foo"}}))
        );
        assert!(out[1].text.starts_with("Restart foo\n\nRestart the foo service now?"));
        assert!(out[1].text.contains("Tool: restart_service\nArgs: {\"name\":\"foo\"}"));

        assert_eq!(h.session.state(), SessionState::AwaitingConfirmation);
        assert_eq!(h.session.pending_action().unwrap().tool, "restart_service");
        assert!(h.backend.calls().is_empty());
        h.assert_invariant();
    }

    #[tokio::test]
    async fn test_confirm_executes_exactly_once_with_staged_arguments() {
        let backend = MockBackend::new(catalog())
            .with_outcome(Ok(ToolOutput::Structured(json!({"status": "restarted"}))));
        let mut h = staged(backend).await;

        let out = h.send("yes").await;
        assert_eq!(
            out,
            vec![
                Envelope::bot(texts::EXECUTING),
                Envelope::result(texts::DONE, json!({"status": "restarted"})),
            ]
        );
        assert_eq!(h.session.state(), SessionState::AwaitingInput);

        let calls = h.backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "restart_service");
        assert_eq!(Value::Object(calls[0].1.clone()), json!({"name": "foo"}));
        h.assert_invariant();
    }

    #[tokio::test]
    async fn test_null_result_has_no_payload() {
        let backend =
            MockBackend::new(catalog()).with_outcome(Ok(ToolOutput::from_result(Value::Null)));
        let mut h = staged(backend).await;

        let out = h.send("yes").await;
        assert_eq!(out[1].kind, EnvelopeKind::Result);
        assert_eq!(out[1].text, texts::DONE);
        assert_eq!(out[1].payload, None);
    }

    #[tokio::test]
    async fn test_disconnect_during_execution_abandons_session() {
        let gate = Arc::new(Semaphore::new(0));
        let llm = Arc::new(MockLlmClient::new().with_reply(RESTART_PLAN));
        let backend = Arc::new(
            MockBackend::new(catalog())
                .with_outcome(Ok(ToolOutput::Structured(json!({"status": "restarted"}))))
                .gated(gate.clone()),
        );
        let deps = SessionDeps {
            catalog: ToolCatalogClient::new(backend.clone()),
            planner: Arc::new(PlannerAdapter::new(llm.clone())),
            executor: ToolExecutor::new(backend.clone()),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::start(&deps, tx).await.unwrap();

        // 入站流永不结束：只有出站端断开能让 run 返回
        let frames = ["restart service foo", "yes"]
            .iter()
            .map(|t| json!({"type": "user", "text": t}).to_string())
            .collect::<Vec<_>>();
        let inbound = stream::iter(frames).chain(stream::pending::<String>());
        let run = tokio::spawn(session.run(inbound));

        tokio::time::timeout(Duration::from_secs(5), async {
            while backend.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("tool call never started");

        drop(rx);
        gate.add_permits(1);

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("session kept running after disconnect")
            .unwrap();
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_yes_is_planned_not_executed() {
        let backend = MockBackend::new(catalog())
            .with_outcome(Ok(ToolOutput::Structured(json!({"status": "restarted"}))));
        let mut h = staged(backend).await;

        h.send("yes").await;
        let out = h.send("yes").await;

        assert_eq!(out[0], Envelope::bot(texts::THINKING));
        assert_eq!(out[1], Envelope::bot(texts::NO_ACTION));
        assert_eq!(h.llm.call_count(), 2);
        assert_eq!(h.backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_clears_without_executing() {
        let mut h = staged(MockBackend::new(catalog())).await;

        let out = h.send("  No ").await;
        assert_eq!(out, vec![Envelope::bot(texts::CANCELLED)]);
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
        assert!(h.backend.calls().is_empty());
        h.assert_invariant();
    }

    #[tokio::test]
    async fn test_unclear_reply_keeps_pending_action() {
        let mut h = staged(MockBackend::new(catalog())).await;
        let before = h.session.pending_action().cloned();

        let out = h.send("maybe").await;
        assert_eq!(out, vec![Envelope::bot(texts::ASK_YES_NO)]);
        assert_eq!(h.session.state(), SessionState::AwaitingConfirmation);
        assert_eq!(h.session.pending_action().cloned(), before);
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_execution_failure_clears_pending() {
        let backend = MockBackend::new(catalog())
            .with_outcome(Err(BackendError::ToolFailed("service foo not found".into())));
        let mut h = staged(backend).await;

        let out = h.send("ok").await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Envelope::bot(texts::EXECUTING));
        assert_eq!(
            out[1],
            Envelope::error("❌ Execution failed: service foo not found")
        );
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
        assert_eq!(h.backend.calls().len(), 1);
        h.assert_invariant();
    }

    #[tokio::test]
    async fn test_null_tool_is_not_staged() {
        let mut h = Harness::new(
            MockLlmClient::new().with_reply(NULL_PLAN),
            MockBackend::new(catalog()),
        )
        .await;

        let out = h.send("tell me a joke").await;
        assert_eq!(
            out,
            vec![Envelope::bot(texts::THINKING), Envelope::bot(texts::NO_ACTION)]
        );
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
        assert!(h.session.pending_action().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_plan_degrades_to_no_action() {
        let mut h = Harness::new(
            MockLlmClient::new().with_reply("I think you mean restart?"),
            MockBackend::new(catalog()),
        )
        .await;

        let out = h.send("restart").await;
        assert_eq!(out[1], Envelope::bot(texts::NO_ACTION));
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_planner_failure_reports_error() {
        let mut h = Harness::new(
            MockLlmClient::new().with_error(LlmError::Api("503 upstream".into())),
            MockBackend::new(catalog()),
        )
        .await;

        let out = h.send("restart service foo").await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Envelope::bot(texts::THINKING));
        assert_eq!(out[1].kind, EnvelopeKind::Error);
        assert!(out[1].text.starts_with("LLM error:"));
        assert!(out[1].text.contains("503 upstream"));
        assert_eq!(h.session.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_negative_word_without_pending_is_a_request() {
        let mut h = Harness::new(MockLlmClient::new(), MockBackend::new(catalog())).await;

        let out = h.send("no").await;
        assert_eq!(out[0], Envelope::bot(texts::THINKING));
        assert!(out.iter().all(|e| e.kind != EnvelopeKind::Error));
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_input_leaves_state_unchanged() {
        let mut h = Harness::new(MockLlmClient::new(), MockBackend::new(catalog())).await;
        let out = h.send_raw("not json").await;
        assert_eq!(out, vec![Envelope::error(texts::INVALID_MESSAGE)]);
        assert_eq!(h.session.state(), SessionState::AwaitingInput);

        let mut h = staged(MockBackend::new(catalog())).await;
        let out = h.send_raw(r#"{"type":"user"}"#).await;
        assert_eq!(out, vec![Envelope::error(texts::INVALID_MESSAGE)]);
        let out = h.send_raw(r#"{"type":"bot","text":"yes"}"#).await;
        assert_eq!(out, vec![Envelope::error(texts::UNSUPPORTED_TYPE)]);

        assert_eq!(h.session.state(), SessionState::AwaitingConfirmation);
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_run_processes_stream_in_order() {
        let llm = Arc::new(MockLlmClient::new().with_reply(RESTART_PLAN));
        let backend = Arc::new(
            MockBackend::new(catalog())
                .with_outcome(Ok(ToolOutput::JsonText(r#"{"status":"restarted"}"#.into()))),
        );
        let deps = SessionDeps {
            catalog: ToolCatalogClient::new(backend.clone()),
            planner: Arc::new(PlannerAdapter::new(llm.clone())),
            executor: ToolExecutor::new(backend.clone()),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::start(&deps, tx).await.unwrap();

        let frames = ["restart service foo", "yes", "yes"]
            .iter()
            .map(|t| json!({"type": "user", "text": t}).to_string())
            .collect::<Vec<_>>();
        session.run(futures_util::stream::iter(frames)).await;

        let mut kinds = Vec::new();
        while let Ok(env) = rx.try_recv() {
            kinds.push((env.kind, env.payload));
        }
        let result_count = kinds
            .iter()
            .filter(|(k, _)| *k == EnvelopeKind::Result)
            .count();
        assert_eq!(result_count, 1);
        assert!(kinds.contains(&(EnvelopeKind::Result, Some(json!({"status": "restarted"})))));
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(llm.call_count(), 2);
    }
}
