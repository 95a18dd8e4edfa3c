//! 测试用的脚本化传输层

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use common::{CameraTransport, OutboundRequest, PushError, RawResponse};

type Responder = dyn Fn(&OutboundRequest) -> Result<RawResponse, PushError> + Send + Sync;

/// 记录所有请求，并由闭包决定每次的响应
pub struct RecordingTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl RecordingTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&OutboundRequest) -> Result<RawResponse, PushError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CameraTransport for RecordingTransport {
    async fn put(&self, request: &OutboundRequest) -> Result<RawResponse, PushError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

/// 对地址中含 `slow_marker` 的目标先等待 `delay` 再失败（模拟超时），其余立即成功；
/// 按完成顺序记录地址
pub struct SlowTransport {
    slow_marker: &'static str,
    delay: Duration,
    completed: Mutex<Vec<String>>,
}

impl SlowTransport {
    pub fn new(slow_marker: &'static str, delay: Duration) -> Self {
        Self {
            slow_marker,
            delay,
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CameraTransport for SlowTransport {
    async fn put(&self, request: &OutboundRequest) -> Result<RawResponse, PushError> {
        let result = if request.url.contains(self.slow_marker) {
            tokio::time::sleep(self.delay).await;
            Err(PushError::NetworkFailure("timed out".to_string()))
        } else {
            Ok(ok_response("OK"))
        };
        self.completed.lock().unwrap().push(request.url.clone());
        result
    }
}

pub fn ok_response(body: &str) -> RawResponse {
    RawResponse {
        status: 200,
        www_authenticate: Vec::new(),
        body: body.to_string(),
    }
}

pub fn challenge_response(challenge: &str) -> RawResponse {
    RawResponse {
        status: 401,
        www_authenticate: vec![challenge.to_string()],
        body: "<ResponseStatus><statusCode>4</statusCode></ResponseStatus>".to_string(),
    }
}
