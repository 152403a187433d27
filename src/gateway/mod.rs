//! 会话网关
//!
//! - **message**：信封协议（出站 bot / confirm / result / error，入站 user）
//! - **session**：每连接一个的确认式状态机（规划 → 待确认 → 单次执行）
//! - **hub**：axum WebSocket 入口、/health 与 CORS

mod hub;
mod message;
mod session;

pub use hub::{Hub, HubConfig};
pub use message::{Envelope, EnvelopeKind, IncomingMessage};
pub use session::{texts, Reply, Session, SessionDeps, SessionId, SessionState};
