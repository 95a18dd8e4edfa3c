use std::time::Duration;

use async_trait::async_trait;
use common::{CameraTransport, OutboundRequest, PushError, RawResponse};
use log::*;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::redirect::Policy;

use crate::executor::MAX_TIMEOUT_MS;

/// 基于 reqwest 的摄像机传输层
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, PushError> {
        // Per-request deadlines are applied in `put`; this only caps connection setup.
        // A 3xx is the camera's answer to this PUT and is never followed.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_millis(MAX_TIMEOUT_MS))
            .redirect(Policy::none())
            .build()
            .map_err(|e| PushError::NetworkFailure(e.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl CameraTransport for HttpTransport {
    async fn put(&self, request: &OutboundRequest) -> Result<RawResponse, PushError> {
        let mut builder = self
            .http_client
            .put(&request.url)
            .timeout(request.timeout)
            .header(CONTENT_TYPE, request.content_type)
            .header(ACCEPT, "*/*")
            // A sized body is always sent with Content-Length, never chunked.
            .body(request.body.as_bytes().to_vec());
        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let www_authenticate = response
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();
        let bytes = response.bytes().await.map_err(network_error)?;
        debug!("PUT {} -> {} ({} bytes)", request.url, status, bytes.len());

        Ok(RawResponse {
            status,
            www_authenticate,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn network_error(err: reqwest::Error) -> PushError {
    let reason = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    PushError::NetworkFailure(format!("{reason}: {err}"))
}
