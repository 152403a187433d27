//! 会话通道的消息协议
//!
//! 出站：`{"type": "bot" | "confirm" | "result" | "error", "text": ..., "payload"?: ...}`
//! 入站：只接受 `{"type": "user", "text": ...}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::GatewayError;

/// 出站信封类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Bot,
    Confirm,
    Result,
    Error,
}

/// 出站信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Envelope {
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Bot,
            text: text.into(),
            payload: None,
        }
    }

    pub fn confirm(text: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: EnvelopeKind::Confirm,
            text: text.into(),
            payload: Some(payload),
        }
    }

    /// 工具没有返回结果（null）时不带 payload
    pub fn result(text: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: EnvelopeKind::Result,
            text: text.into(),
            payload: (!payload.is_null()).then_some(payload),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Error,
            text: text.into(),
            payload: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 入站消息
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl IncomingMessage {
    /// 解析原始帧并校验 type == "user"，返回用户文本
    pub fn parse_user_text(raw: &str) -> Result<String, GatewayError> {
        let msg: IncomingMessage = serde_json::from_str(raw)
            .map_err(|e| GatewayError::MalformedInput(e.to_string()))?;
        if msg.kind != "user" {
            return Err(GatewayError::UnsupportedType(msg.kind));
        }
        Ok(msg.text)
    }
}
