use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod model;
mod targets;
mod text;

pub use model::*;
pub use targets::normalize_targets;
pub use text::{MAX_RESPONSE_CHARS, TRUNCATION_MARKER, truncate_body};

/// 推送错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("Invalid camera target: {0}")]
    InvalidTarget(String),

    #[error("Invalid digest challenge: {0}")]
    DigestChallengeInvalid(String),

    #[error("Digest auth required but username/password are empty.")]
    CredentialsRequired,

    #[error("Network error: {0}")]
    NetworkFailure(String),

    #[error("Camera responded with HTTP status {0}")]
    ProtocolFailure(u16),

    #[error("Payload encoding error: {0}")]
    PayloadEncoding(String),
}

impl PushError {
    /// 错误种类（用于结果中的结构化错误）
    pub fn kind(&self) -> ErrorKind {
        match self {
            PushError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            PushError::DigestChallengeInvalid(_) => ErrorKind::DigestChallengeInvalid,
            PushError::CredentialsRequired => ErrorKind::CredentialsRequired,
            PushError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            PushError::ProtocolFailure(_) => ErrorKind::ProtocolFailure,
            PushError::PayloadEncoding(_) => ErrorKind::PayloadEncoding,
        }
    }
}

/// 错误种类（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidTarget,
    DigestChallengeInvalid,
    CredentialsRequired,
    NetworkFailure,
    ProtocolFailure,
    PayloadEncoding,
}

/// 单个目标结果中携带的错误记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PushError> for ErrorRecord {
    fn from(err: &PushError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<PushError> for ErrorRecord {
    fn from(err: PushError) -> Self {
        ErrorRecord::from(&err)
    }
}

/// 发往单台摄像机的一次 PUT 请求
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// 完整请求地址
    pub url: String,
    pub content_type: &'static str,
    /// 所有目标共享同一份请求体
    pub body: Arc<str>,
    /// `Authorization: Digest ...`，仅在质询后的重试中存在
    pub authorization: Option<String>,
    /// 连接与读取阶段的超时
    pub timeout: Duration,
}

/// 摄像机返回的原始响应
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// 所有 `WWW-Authenticate` 头的值
    pub www_authenticate: Vec<String>,
    pub body: String,
}

/// 传输层能力trait（推送引擎通过它访问网络）
#[async_trait]
pub trait CameraTransport: Send + Sync {
    /// 发送一次 PUT 请求并完整读取响应
    async fn put(&self, request: &OutboundRequest) -> Result<RawResponse, PushError>;
}

/// 推送配置trait：一种可下发到摄像机的配置载荷
pub trait PushProfile: Send + Sync {
    /// 配置名称（用于日志）
    fn name(&self) -> &'static str;

    /// 请求体的 Content-Type
    fn content_type(&self) -> &'static str;

    /// 序列化为线上请求体
    fn render(&self) -> Result<String, PushError>;
}
