use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{
    AuthType, CameraTransport, Credentials, ErrorRecord, OutboundRequest, PushError, PushResult,
    truncate_body,
};
use log::*;
use url::Url;

use crate::digest::{self, DigestChallenge};

pub const HTTP_HOST_NOTIFICATION_PATH: &str = "/ISAPI/Event/notification/httpHosts/1";
pub const MIXED_TARGET_PATH: &str = "/ISAPI/Intelligent/channels/1/mixedTargetDetection?format=json";

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const MIN_TIMEOUT_MS: u64 = 2_000;
pub const MAX_TIMEOUT_MS: u64 = 60_000;

const METHOD: &str = "PUT";

/// 一批推送中所有目标共享的只读参数
#[derive(Debug, Clone)]
pub struct PushJob {
    pub endpoint_path: String,
    pub body: Arc<str>,
    pub content_type: &'static str,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl PushJob {
    fn request(&self, url: &Url, authorization: Option<String>) -> OutboundRequest {
        OutboundRequest {
            url: url.to_string(),
            content_type: self.content_type,
            body: Arc::clone(&self.body),
            authorization,
            timeout: self.timeout,
        }
    }
}

/// 单个目标的 HTTP 交互结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub status: u16,
    pub body: String,
    pub auth_type: AuthType,
    pub error: Option<PushError>,
}

/// 规范化端点路径：空白时使用默认路径，并保证以 `/` 开头
pub fn normalize_endpoint_path(endpoint_path: Option<&str>) -> String {
    let path = endpoint_path
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(HTTP_HOST_NOTIFICATION_PATH);
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// 超时限制在 [2s, 60s]，默认 10s
pub fn normalize_timeout(timeout_ms: Option<i64>) -> Duration {
    let ms = match timeout_ms {
        None => DEFAULT_TIMEOUT_MS,
        Some(ms) => ms.clamp(MIN_TIMEOUT_MS as i64, MAX_TIMEOUT_MS as i64) as u64,
    };
    Duration::from_millis(ms)
}

/// 根据目标地址构造请求 URL。
///
/// 带协议的目标只保留协议、主机和端口，原有路径与查询串被 `endpoint_path` 替换；
/// 其余目标视为 `host[:port]`，加上 `http://` 前缀。
pub fn build_target_url(target: &str, endpoint_path: &str) -> Result<Url, PushError> {
    let normalized = target.trim();
    let invalid = |reason: String| PushError::InvalidTarget(format!("{target} ({reason})"));

    let url = if normalized.contains("://") {
        let base = Url::parse(normalized).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        let host = base
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let port = base.port().map(|p| format!(":{p}")).unwrap_or_default();
        Url::parse(&format!("{}://{host}{port}{endpoint_path}", base.scheme()))
    } else {
        Url::parse(&format!("http://{normalized}{endpoint_path}"))
    }
    .map_err(|e| invalid(e.to_string()))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// 执行一次 PUT，遇到 Digest 质询时带凭据重试一次
pub async fn execute_put(
    transport: &dyn CameraTransport,
    url: &Url,
    job: &PushJob,
) -> Result<Execution, PushError> {
    let first = transport.put(&job.request(url, None)).await?;
    let challenge = if first.status == 401 {
        digest::find_digest_challenge(&first.www_authenticate)
    } else {
        None
    };
    let Some(challenge) = challenge else {
        return Ok(Execution {
            status: first.status,
            body: first.body,
            auth_type: AuthType::None,
            error: None,
        });
    };

    let Some(credentials) = job.credentials.as_ref() else {
        return Ok(Execution {
            status: first.status,
            body: first.body,
            auth_type: AuthType::Digest,
            error: Some(PushError::CredentialsRequired),
        });
    };

    let challenge = DigestChallenge::parse(challenge)?;
    let uri = digest::digest_uri(url);
    let authorization =
        challenge.authorization(METHOD, &uri, credentials, &digest::generate_cnonce());
    debug!(
        "Digest challenge from {url} (realm={}, algorithm={}), retrying with credentials",
        challenge.realm, challenge.algorithm
    );

    let second = transport.put(&job.request(url, Some(authorization))).await?;
    Ok(Execution {
        status: second.status,
        body: second.body,
        auth_type: AuthType::Digest,
        error: None,
    })
}

/// 推送到单个目标；任何错误都转换为失败结果，不会向上传播
pub async fn push_target(transport: &dyn CameraTransport, target: &str, job: &PushJob) -> PushResult {
    let started = Instant::now();
    let url = match build_target_url(target, &job.endpoint_path) {
        Ok(url) => url,
        Err(err) => {
            warn!("Skipping camera target '{target}': {err}");
            return PushResult::failed(target, &err, elapsed_ms(started));
        }
    };

    match execute_put(transport, &url, job).await {
        Ok(execution) => {
            let success = (200..300).contains(&execution.status);
            let error = match execution.error {
                Some(err) => Some(err),
                None if !success => Some(PushError::ProtocolFailure(execution.status)),
                None => None,
            };
            if let Some(err) = &error {
                warn!("Push to {url} failed: {err}");
            } else {
                debug!("Push to {url} succeeded with HTTP {}", execution.status);
            }
            PushResult {
                camera_target: target.to_string(),
                request_url: Some(url.to_string()),
                success,
                status_code: Some(execution.status),
                auth_type: execution.auth_type,
                duration_ms: elapsed_ms(started),
                response_body: truncate_body(execution.body),
                error: error.as_ref().map(ErrorRecord::from),
            }
        }
        Err(err) => {
            warn!("Push to {url} failed: {err}");
            PushResult {
                request_url: Some(url.to_string()),
                ..PushResult::failed(target, &err, elapsed_ms(started))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, challenge_response, ok_response};
    use common::{ErrorKind, MAX_RESPONSE_CHARS, RawResponse, TRUNCATION_MARKER};

    fn job(credentials: Option<Credentials>) -> PushJob {
        PushJob {
            endpoint_path: HTTP_HOST_NOTIFICATION_PATH.to_string(),
            body: Arc::from("<HttpHostNotification/>"),
            content_type: "application/xml; charset=UTF-8",
            credentials,
            timeout: normalize_timeout(None),
        }
    }

    fn admin() -> Option<Credentials> {
        Credentials::from_parts(Some("admin"), Some("12345"))
    }

    #[test]
    fn test_endpoint_path_normalization() {
        assert_eq!(normalize_endpoint_path(None), HTTP_HOST_NOTIFICATION_PATH);
        assert_eq!(normalize_endpoint_path(Some("   ")), HTTP_HOST_NOTIFICATION_PATH);
        assert_eq!(normalize_endpoint_path(Some(" ISAPI/x ")), "/ISAPI/x");
        assert_eq!(normalize_endpoint_path(Some("/ISAPI/y")), "/ISAPI/y");
    }

    #[test]
    fn test_timeout_clamping() {
        assert_eq!(normalize_timeout(None), Duration::from_millis(10_000));
        assert_eq!(normalize_timeout(Some(500)), Duration::from_millis(2_000));
        assert_eq!(normalize_timeout(Some(-1)), Duration::from_millis(2_000));
        assert_eq!(normalize_timeout(Some(15_000)), Duration::from_millis(15_000));
        assert_eq!(normalize_timeout(Some(600_000)), Duration::from_millis(60_000));
    }

    #[test]
    fn test_bare_host_gets_http_prefix() {
        let url = build_target_url("10.0.0.5:8080", HTTP_HOST_NOTIFICATION_PATH).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:8080/ISAPI/Event/notification/httpHosts/1");
    }

    #[test]
    fn test_url_target_keeps_only_origin() {
        let url = build_target_url("https://cam.local:8443/some/path?x=1", MIXED_TARGET_PATH).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cam.local:8443/ISAPI/Intelligent/channels/1/mixedTargetDetection?format=json"
        );
        let url = build_target_url("http://[::1]:81/old", "/new").unwrap();
        assert_eq!(url.as_str(), "http://[::1]:81/new");
    }

    #[test]
    fn test_invalid_targets() {
        for target in ["http://:8080", "ftp://cam", "[bad"] {
            let err = build_target_url(target, "/x").unwrap_err();
            assert!(matches!(err, PushError::InvalidTarget(_)), "{target}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_success_without_challenge() {
        let transport = RecordingTransport::new(|_| Ok(ok_response("<ResponseStatus/>")));
        let result = push_target(&transport, "cam1", &job(admin())).await;
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.auth_type, AuthType::None);
        assert!(result.error.is_none());
        assert_eq!(result.response_body, "<ResponseStatus/>");
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].authorization.is_none());
    }

    #[tokio::test]
    async fn test_digest_retry_succeeds() {
        let transport = RecordingTransport::new(|req| {
            Ok(match req.authorization {
                None => challenge_response(r#"Digest realm="DS-2CD", nonce="4e6f6e6365", qop="auth""#),
                Some(_) => ok_response("ok"),
            })
        });
        let result = push_target(&transport, "cam1", &job(admin())).await;
        assert!(result.success);
        assert_eq!(result.auth_type, AuthType::Digest);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
        let authorization = requests[1].authorization.as_deref().unwrap();
        assert!(authorization.starts_with("Digest username=\"admin\""));
        assert!(authorization.contains("uri=\"/ISAPI/Event/notification/httpHosts/1\""));
        assert!(authorization.contains("qop=auth"));
    }

    #[tokio::test]
    async fn test_digest_retry_is_not_repeated() {
        let transport = RecordingTransport::new(|_| {
            Ok(challenge_response(r#"Digest realm="r", nonce="n""#))
        });
        let result = push_target(&transport, "cam1", &job(admin())).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(401));
        assert_eq!(result.auth_type, AuthType::Digest);
        assert_eq!(result.error.unwrap().kind, ErrorKind::ProtocolFailure);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_challenge_without_credentials() {
        let transport = RecordingTransport::new(|_| {
            Ok(challenge_response(r#"Digest realm="r", nonce="n", qop="auth""#))
        });
        let result = push_target(&transport, "cam1", &job(None)).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(401));
        assert_eq!(result.auth_type, AuthType::Digest);
        let error = result.error.unwrap();
        assert_eq!(error.kind, ErrorKind::CredentialsRequired);
        assert!(!error.message.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_401_without_digest_challenge() {
        let transport = RecordingTransport::new(|_| {
            Ok(RawResponse {
                status: 401,
                www_authenticate: vec!["Basic realm=\"cam\"".to_string()],
                body: "denied".to_string(),
            })
        });
        let result = push_target(&transport, "cam1", &job(admin())).await;
        assert_eq!(result.auth_type, AuthType::None);
        assert_eq!(result.status_code, Some(401));
        assert_eq!(result.error.unwrap().kind, ErrorKind::ProtocolFailure);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_challenge_is_per_target_error() {
        let transport = RecordingTransport::new(|_| Ok(challenge_response(r#"Digest realm="r""#)));
        let result = push_target(&transport, "cam1", &job(admin())).await;
        assert!(!result.success);
        assert!(result.status_code.is_none());
        assert_eq!(result.auth_type, AuthType::None);
        assert_eq!(result.error.unwrap().kind, ErrorKind::DigestChallengeInvalid);
        assert!(result.request_url.is_some());
    }

    #[tokio::test]
    async fn test_network_failure() {
        let transport = RecordingTransport::new(|_| {
            Err(PushError::NetworkFailure("connection refused".into()))
        });
        let result = push_target(&transport, "cam1", &job(None)).await;
        assert!(!result.success);
        assert!(result.status_code.is_none());
        assert_eq!(result.error.unwrap().kind, ErrorKind::NetworkFailure);
    }

    #[tokio::test]
    async fn test_invalid_target_makes_no_request() {
        let transport = RecordingTransport::new(|_| Ok(ok_response("")));
        let result = push_target(&transport, "http://", &job(None)).await;
        assert!(result.request_url.is_none());
        assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidTarget);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_large_body_is_truncated() {
        let transport = RecordingTransport::new(|_| Ok(ok_response(&"z".repeat(200_000))));
        let result = push_target(&transport, "cam1", &job(None)).await;
        assert_eq!(
            result.response_body.len(),
            MAX_RESPONSE_CHARS + TRUNCATION_MARKER.len()
        );
    }
}
