//! Hikvision ISAPI 配置推送引擎
//!
//! 将通知通道配置（XML）或混合目标检测配置（JSON）通过 `PUT` 下发到一批摄像机，
//! 遇到 Digest 质询时带凭据重试一次，并汇总每个目标的结果。

pub mod aggregator;
pub mod digest;
pub mod executor;
pub mod payload;
pub mod transport;

#[cfg(test)]
mod testing;

pub use aggregator::{PushOptions, push_mixed_target, push_notification};
pub use executor::{HTTP_HOST_NOTIFICATION_PATH, MIXED_TARGET_PATH};
pub use payload::{MixedTargetSettings, NotificationSettings};
pub use transport::HttpTransport;
