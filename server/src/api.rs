use std::sync::Arc;

use common::CameraTransport;
use hikvision_isapi::PushOptions;
use serde::{Deserialize, Serialize};

/// 推送服务共享状态（不保存任何单次请求的数据）
#[derive(Clone)]
pub struct PushService {
    pub transport: Arc<dyn CameraTransport>,
    pub options: PushOptions,
}

/// 错误响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误信息
    pub error: String,
}
