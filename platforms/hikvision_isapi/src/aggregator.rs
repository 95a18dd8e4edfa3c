use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{
    CameraTransport, Credentials, MixedTargetRequest, PushError, PushProfile, PushRequest,
    PushResponse, PushResult, normalize_targets,
};
use futures::stream::{self, StreamExt};
use log::*;

use crate::executor::{
    MIXED_TARGET_PATH, PushJob, normalize_endpoint_path, normalize_timeout, push_target,
};
use crate::payload::{MixedTargetSettings, NotificationSettings};

/// 批量推送选项
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// 同时进行推送的目标数上限（1 表示按顺序逐个推送）
    pub max_concurrency: usize,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

/// 向所有目标推送 HTTP 主机通知配置
pub async fn push_notification(
    transport: Arc<dyn CameraTransport>,
    request: PushRequest,
    options: &PushOptions,
) -> Result<PushResponse, PushError> {
    let settings = NotificationSettings::normalize(request.payload.as_ref());
    let job = PushJob {
        endpoint_path: normalize_endpoint_path(request.endpoint_path.as_deref()),
        body: Arc::from(settings.render()?),
        content_type: settings.content_type(),
        credentials: Credentials::from_parts(
            request.username.as_deref(),
            request.password.as_deref(),
        ),
        timeout: normalize_timeout(request.timeout_ms),
    };
    run_batch(transport, settings.name(), &request.targets, job, options).await
}

/// 向所有目标推送混合目标检测配置
pub async fn push_mixed_target(
    transport: Arc<dyn CameraTransport>,
    request: MixedTargetRequest,
    options: &PushOptions,
) -> Result<PushResponse, PushError> {
    let settings = MixedTargetSettings::normalize(request.payload.as_ref());
    let job = PushJob {
        endpoint_path: MIXED_TARGET_PATH.to_string(),
        body: Arc::from(settings.render()?),
        content_type: settings.content_type(),
        credentials: Credentials::from_parts(
            request.username.as_deref(),
            request.password.as_deref(),
        ),
        timeout: normalize_timeout(request.timeout_ms),
    };
    run_batch(transport, settings.name(), &request.targets, job, options).await
}

async fn run_batch(
    transport: Arc<dyn CameraTransport>,
    profile: &str,
    raw_targets: &[String],
    job: PushJob,
    options: &PushOptions,
) -> Result<PushResponse, PushError> {
    let targets = normalize_targets(raw_targets);
    info!(
        "Pushing {profile} to {} camera target(s), concurrency {}",
        targets.len(),
        options.max_concurrency.max(1)
    );

    let job = Arc::new(job);
    // `buffered` keeps results in target order and only starts a target once a
    // slot frees up. Spawned tasks keep running if the batch future is dropped.
    let results: Vec<PushResult> = stream::iter(targets)
        .map(|target| {
            let transport = Arc::clone(&transport);
            let job = Arc::clone(&job);
            async move {
                let started = Instant::now();
                let task_target = target.clone();
                let handle = tokio::spawn(async move {
                    push_target(transport.as_ref(), &task_target, &job).await
                });
                match handle.await {
                    Ok(result) => result,
                    Err(join_err) => {
                        error!("Push task for '{target}' aborted: {join_err}");
                        let err = PushError::NetworkFailure(format!("push task aborted: {join_err}"));
                        PushResult::failed(target, &err, elapsed_ms(started.elapsed()))
                    }
                }
            }
        })
        .buffered(options.max_concurrency.max(1))
        .collect()
        .await;

    let response = PushResponse::tally(Utc::now(), job.body.to_string(), results);
    info!(
        "Finished {profile} push: {} succeeded, {} failed",
        response.success_count, response.failure_count
    );
    Ok(response)
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
