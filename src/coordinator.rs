use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use crate::background::{BackgroundExecutor, BackgroundOptions};
use crate::events::SessionCallbacks;
use crate::session::UploadSession;
use crate::store::UploadStore;
use crate::transport::Transport;
use crate::types::{UploadStats, UploadStatus, UploadUpdate};

/// 进程/应用生命周期事件，由宿主注入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycleEvent {
    Foreground,
    Background,
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// 初始化和回到前台时自动批量恢复
    pub auto_resume: bool,
    pub background: BackgroundOptions,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            auto_resume: true,
            background: BackgroundOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinatorState {
    Uninitialized,
    Initialized,
}

/// 进程级协调器：批量恢复、前台恢复、全量暂停/清理、聚合统计。
/// 显式对象而不是隐式全局，每个测试可以构造自己的实例。
pub struct UploadCoordinator {
    store: Arc<UploadStore>,
    transport: Arc<dyn Transport>,
    background: Arc<dyn BackgroundExecutor>,
    state: Mutex<CoordinatorState>,
    auto_resume: Arc<AtomicBool>,
    resumed: Arc<tokio::sync::Mutex<Vec<UploadSession>>>,
    lifecycle_task: Mutex<Option<JoinHandle<()>>>,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<UploadStore>,
        transport: Arc<dyn Transport>,
        background: Arc<dyn BackgroundExecutor>,
    ) -> Self {
        Self {
            store,
            transport,
            background,
            state: Mutex::new(CoordinatorState::Uninitialized),
            auto_resume: Arc::new(AtomicBool::new(true)),
            resumed: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            lifecycle_task: Mutex::new(None),
        }
    }

    /// 幂等初始化：配置后台执行（失败降级为前台模式），订阅生命周期
    /// 事件，auto_resume 开启时立即做一次批量恢复
    pub async fn initialize(
        &self,
        options: CoordinatorOptions,
        lifecycle: Option<mpsc::UnboundedReceiver<AppLifecycleEvent>>,
    ) {
        {
            let mut state = self.state.lock();
            if *state == CoordinatorState::Initialized {
                return;
            }
            *state = CoordinatorState::Initialized;
        }

        self.auto_resume.store(options.auto_resume, Ordering::SeqCst);

        // 后台支持是增强项，配置失败不影响上传
        if let Err(err) = self.background.configure(&options.background).await {
            warn!("background executor configuration failed: {err}");
        }

        if let Some(mut events) = lifecycle {
            let store = self.store.clone();
            let transport = self.transport.clone();
            let auto_resume = self.auto_resume.clone();
            let resumed = self.resumed.clone();

            let task = tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match event {
                        AppLifecycleEvent::Foreground => {
                            if auto_resume.load(Ordering::SeqCst) {
                                resume_active(&store, &transport, &resumed).await;
                            }
                        }
                        // 转后台不做任何事，续传是传输层/系统的职责
                        AppLifecycleEvent::Background => {}
                    }
                }
            });

            *self.lifecycle_task.lock() = Some(task);
        }

        if self.auto_resume.load(Ordering::SeqCst) {
            resume_active(&self.store, &self.transport, &self.resumed).await;
        }
    }

    pub fn set_auto_resume(&self, enabled: bool) {
        self.auto_resume.store(enabled, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        *self.state.lock() == CoordinatorState::Initialized
    }

    /// 把所有活跃记录标记为 paused。只更新持久化状态：协调器不持有
    /// 调用方自己创建的会话，影响的是下一次批量恢复看到的状态，
    /// 而不是已经在跑的传输
    pub async fn pause_all_uploads(&self) {
        for record in self.store.list_active().await {
            self.store
                .update(record.id, UploadUpdate::status(UploadStatus::Paused))
                .await;
        }
    }

    pub async fn clear_completed_uploads(&self) {
        self.store.clear_completed().await;
    }

    pub async fn clear_all_uploads(&self) {
        self.store.clear_all().await;
    }

    /// 按状态聚合的计数
    pub async fn upload_stats(&self) -> UploadStats {
        let mut stats = UploadStats::default();
        for record in self.store.list().await {
            stats.total += 1;
            match record.status {
                UploadStatus::Pending | UploadStatus::Uploading => stats.active += 1,
                UploadStatus::Completed => stats.completed += 1,
                UploadStatus::Failed => stats.failed += 1,
                UploadStatus::Paused => stats.paused += 1,
            }
        }

        stats
    }

    /// 退订生命周期事件并回到 uninitialized
    pub fn destroy(&self) {
        if let Some(task) = self.lifecycle_task.lock().take() {
            task.abort();
        }
        *self.state.lock() = CoordinatorState::Uninitialized;
    }
}

impl Drop for UploadCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.lifecycle_task.lock().take() {
            task.abort();
        }
    }
}

/// 批量恢复。逐条独立处理：重建失败或 start 失败只把那条记录标成
/// failed，不中断整批。URL 还没协商过的记录无法在协议层续传，跳过。
async fn resume_active(
    store: &Arc<UploadStore>,
    transport: &Arc<dyn Transport>,
    resumed: &Arc<tokio::sync::Mutex<Vec<UploadSession>>>,
) {
    for record in store.list_active().await {
        if record.url.is_none() {
            continue;
        }

        let session = UploadSession::from_record(
            &record,
            SessionCallbacks::default(),
            store.clone(),
            transport.clone(),
        );

        match session.start().await {
            Ok(()) => {
                // 持有会话引用，传输句柄才能活过这次循环
                resumed.lock().await.push(session);
            }
            Err(err) => {
                warn!(upload_id = %record.id, "failed to resume upload: {err}");
                store
                    .update(
                        record.id,
                        UploadUpdate {
                            status: Some(UploadStatus::Failed),
                            error: Some(err.to_string()),
                            ..Default::default()
                        },
                    )
                    .await;
            }
        }
    }
}
