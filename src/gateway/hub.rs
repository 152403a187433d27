//! Hub：会话通道的 HTTP 入口
//!
//! - `GET /ws`：WebSocket 升级，每个连接一个 Session，读循环与写循环并行，任一结束即拆除会话
//! - `GET /health`：存活探针
//! - CORS：配置中的 Origin 白名单，允许携带凭据

use std::net::SocketAddr;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{future, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use super::message::Envelope;
use super::session::{Session, SessionDeps};
use crate::core::GatewayError;

/// Hub 配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// 监听地址
    pub bind_addr: String,
    /// CORS 白名单；含 "*" 时回显请求的 Origin
    pub allowed_origins: Vec<String>,
}

pub struct Hub {
    config: HubConfig,
    deps: SessionDeps,
}

impl Hub {
    pub fn new(config: HubConfig, deps: SessionDeps) -> Self {
        Self { config, deps }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health))
            .with_state(self.deps.clone())
            .layer(cors_layer(&self.config.allowed_origins))
    }

    /// 绑定配置地址并服务，直到 shutdown 被触发
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<(), GatewayError> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| GatewayError::Bind(format!("{}: {}", self.config.bind_addr, e)))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        self.serve_on(listener, shutdown).await
    }

    /// 在已绑定的 listener 上服务（测试使用 127.0.0.1:0）
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), GatewayError> {
        let local = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        tracing::info!("Gateway listening on ws://{}/ws", local);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| GatewayError::Bind(e.to_string()))
    }
}

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn ws_handler(State(deps): State<SessionDeps>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(deps, socket))
}

async fn handle_socket(deps: SessionDeps, mut socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    let session = match Session::start(&deps, tx).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Session start failed, closing connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "tool catalog unavailable".into(),
                })))
                .await;
            return;
        }
    };
    let session_id = session.id().to_string();

    let (mut ws_sink, ws_stream) = socket.split();

    let write_task = async move {
        while let Some(envelope) = rx.recv().await {
            if ws_sink
                .send(Message::Text(envelope.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    };

    let inbound = ws_stream
        .take_while(|frame| future::ready(is_open(frame)))
        .filter_map(|frame| future::ready(frame_text(frame)));

    tokio::select! {
        _ = write_task => {},
        _ = session.run(inbound) => {},
    }

    tracing::info!(session = %session_id, "WebSocket connection closed");
}

fn is_open(frame: &Result<Message, axum::Error>) -> bool {
    match frame {
        Ok(Message::Close(_)) => false,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket receive error");
            false
        }
    }
}

/// 文本帧原样交给会话；UTF-8 二进制帧按文本处理；ping/pong 忽略
fn frame_text(frame: Result<Message, axum::Error>) -> Option<String> {
    match frame {
        Ok(Message::Text(text)) => Some(text.to_string()),
        Ok(Message::Binary(bytes)) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
