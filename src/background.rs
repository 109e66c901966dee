use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::errors::Result;

/// 后台执行配置，具体效果由平台定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundOptions {
    pub enable_notifications: bool,
    pub notification_title: String,
    pub enable_ios_background_task: bool,
    /// 平台相关
    pub parallelize: bool,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            enable_notifications: false,
            notification_title: String::new(),
            enable_ios_background_task: false,
            parallelize: false,
        }
    }
}

/// 后台执行协作者 - 通知、后台任务调度等由宿主平台实现。
/// 配置失败由协调器吞掉，后台支持是增强项而不是正确性要求。
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    async fn configure(&self, options: &BackgroundOptions) -> Result<()>;
}

/// 默认空实现，纯前台模式
#[derive(Debug, Default)]
pub struct NoopBackgroundExecutor;

#[async_trait]
impl BackgroundExecutor for NoopBackgroundExecutor {
    async fn configure(&self, _options: &BackgroundOptions) -> Result<()> {
        Ok(())
    }
}
