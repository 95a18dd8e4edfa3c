use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ErrorRecord, PushError};

/// 通知通道推送请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// 原始目标列表（可能包含逗号/空格/分号分隔的多个地址）
    #[serde(
        rename = "cameraTargets",
        alias = "targets",
        default,
        deserialize_with = "de_targets"
    )]
    pub targets: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub endpoint_path: Option<String>,
    pub timeout_ms: Option<i64>,
    pub payload: Option<NotificationPayload>,
}

/// HTTP 主机通知配置（所有字段可选，未设置时使用默认值）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: Option<i32>,
    pub url: Option<String>,
    pub protocol_type: Option<String>,
    pub parameter_format_type: Option<String>,
    pub addressing_format_type: Option<String>,
    pub ip_address: Option<String>,
    pub port_no: Option<i32>,
    pub user_name: Option<String>,
    pub http_authentication_method: Option<String>,
    pub detection_up_load_pictures_type: Option<String>,
    pub video_upload_enabled: Option<bool>,
    pub heartbeat: Option<i32>,
    pub event_mode: Option<String>,
    pub enabled: Option<bool>,
    pub check_response_enabled: Option<bool>,
}

/// 混合目标检测推送请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixedTargetRequest {
    #[serde(
        rename = "cameraTargets",
        alias = "targets",
        default,
        deserialize_with = "de_targets"
    )]
    pub targets: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: Option<i64>,
    pub payload: Option<MixedTargetPayload>,
}

/// 混合目标检测配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixedTargetPayload {
    pub enabled: Option<bool>,
    /// 是否支持二进制图片上传
    #[serde(rename = "isSupportBinaryPicUp")]
    pub binary_upload: Option<bool>,
    /// 是否将二进制图片转换为 BMP
    #[serde(rename = "convertBinToBmpEnabled")]
    pub convert_to_bmp: Option<bool>,
}

/// 认证方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Digest,
}

/// 单个目标的推送结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub camera_target: String,
    /// URL 构造失败时为空
    pub request_url: Option<String>,
    pub success: bool,
    pub status_code: Option<u16>,
    pub auth_type: AuthType,
    pub duration_ms: u64,
    /// 响应体（可能被截断）
    pub response_body: String,
    pub error: Option<ErrorRecord>,
}

impl PushResult {
    /// 在发出或完成 HTTP 交互之前失败的目标
    pub fn failed(target: impl Into<String>, error: &PushError, duration_ms: u64) -> Self {
        Self {
            camera_target: target.into(),
            request_url: None,
            success: false,
            status_code: None,
            auth_type: AuthType::None,
            duration_ms,
            response_body: String::new(),
            error: Some(ErrorRecord::from(error)),
        }
    }
}

/// 推送响应
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub executed_at: DateTime<Utc>,
    /// 发送给每个目标的原始请求体
    pub payload_body: String,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<PushResult>,
}

impl PushResponse {
    /// 汇总各目标结果
    pub fn tally(executed_at: DateTime<Utc>, payload_body: String, results: Vec<PushResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len().saturating_sub(success_count);
        Self {
            executed_at,
            payload_body,
            success_count,
            failure_count,
            results,
        }
    }
}

/// 单次调用提供的认证凭据
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// 用户名与密码都非空时才构成凭据（两端空白会被去掉）
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        let username = non_blank(username)?;
        let password = non_blank(password)?;
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// Accepts `null` for the whole list and for individual entries.
fn de_targets<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default().into_iter().flatten().collect())
}
