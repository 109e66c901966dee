use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;
use crate::errors::{Result, UploadError, codes};
use crate::events::{
    ChunkCompleteHandler, ErrorHandler, HandlerRegistry, ProgressHandler, SessionCallbacks,
    SuccessHandler,
};
use crate::store::UploadStore;
use crate::transport::{Transport, TransportEvent, TransportHandle};
use crate::types::{
    ChunkProgress, PreviousUpload, ProgressSnapshot, UploadId, UploadMetadata, UploadOptions,
    UploadStatus, UploadUpdate,
};

struct SessionInner {
    status: UploadStatus,
    handle: Option<Box<dyn TransportHandle>>,
    upload_url: Option<String>,
    progress: Option<ProgressSnapshot>,
    pump: Option<JoinHandle<()>>,
}

/// 一次逻辑上传：持有身份、文件引用、配置、传输句柄和事件注册表，
/// 在调用方的生命周期命令和传输回调之间做协调，并保持 Store 同步。
///
/// 状态机：
/// ```text
/// pending --start()--> uploading --[transport: success]--> completed
/// uploading --pause()--> paused
/// paused --resume()/start()--> uploading
/// uploading --[transport: error]--> failed
/// 非终态 --abort()--> failed（completed 不受影响）
/// ```
pub struct UploadSession {
    id: UploadId,
    file_path: PathBuf,
    upload_size: u64,
    options: UploadOptions,
    store: Arc<UploadStore>,
    transport: Arc<dyn Transport>,
    handlers: Arc<HandlerRegistry>,
    inner: Arc<Mutex<SessionInner>>,
}

impl UploadSession {
    /// 创建新会话。文件大小在这里固定；持久化记录要到首次 start() 才建立
    pub async fn new(
        file_path: impl Into<PathBuf>,
        options: UploadOptions,
        callbacks: SessionCallbacks,
        store: Arc<UploadStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let file_path = file_path.into();
        let upload_size = if options.upload_length_deferred {
            0
        } else {
            tokio::fs::metadata(&file_path).await?.len()
        };

        Ok(Self {
            id: UploadId::new(),
            file_path,
            upload_size,
            options,
            store,
            transport,
            handlers: Arc::new(HandlerRegistry::new(callbacks)),
            inner: Arc::new(Mutex::new(SessionInner {
                status: UploadStatus::Pending,
                handle: None,
                upload_url: None,
                progress: None,
                pump: None,
            })),
        })
    }

    /// 从持久化记录重建会话，批量恢复用。沿用记录的 id 和已协商的 URL
    pub fn from_record(
        record: &UploadMetadata,
        callbacks: SessionCallbacks,
        store: Arc<UploadStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: record.id,
            file_path: record.file_path.clone(),
            upload_size: record.upload_size,
            options: record.options.clone(),
            store,
            transport,
            handlers: Arc::new(HandlerRegistry::new(callbacks)),
            inner: Arc::new(Mutex::new(SessionInner {
                status: record.status,
                handle: None,
                upload_url: record.url.clone(),
                progress: Some(ProgressSnapshot::new(record.offset, record.upload_size)),
                pump: None,
            })),
        }
    }

    pub fn id(&self) -> UploadId {
        self.id
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    pub async fn status(&self) -> UploadStatus {
        self.inner.lock().await.status
    }

    pub async fn upload_url(&self) -> Option<String> {
        self.inner.lock().await.upload_url.clone()
    }

    /// 开始（或重新开始）上传。重复调用复用已有的传输句柄，
    /// 不会创建第二个。创建/调度失败时错误既返回给调用方，
    /// 也分发到 error 通道。
    pub async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.handle.is_none() {
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let handle = match self
                .transport
                .create(
                    &self.file_path,
                    &self.options,
                    inner.upload_url.as_deref(),
                    event_tx,
                )
                .await
            {
                Ok(handle) => handle,
                Err(err) => {
                    let descriptor = err.as_transport_error(codes::UPLOAD_SCHEDULE_FAILED);
                    self.handlers.emit_error(&descriptor);
                    return Err(err);
                }
            };

            inner.handle = Some(handle);
            inner.pump = Some(self.spawn_pump(event_rx));
        }

        // 首次 start 时才建立持久化记录
        if self.store.get(self.id).await.is_none() {
            let mut record = UploadMetadata::new(
                self.id,
                self.file_path.clone(),
                self.upload_size,
                self.options.clone(),
            );
            record.url = inner.upload_url.clone();
            self.store.add(record).await;
        }

        inner.status = UploadStatus::Uploading;
        self.store
            .update(self.id, UploadUpdate::status(UploadStatus::Uploading))
            .await;

        let handle = inner.handle.as_mut().ok_or(UploadError::NotStarted)?;
        if let Err(err) = handle.start().await {
            let descriptor = err.as_transport_error(codes::UPLOAD_SCHEDULE_FAILED);
            inner.status = UploadStatus::Failed;
            self.store
                .update(
                    self.id,
                    UploadUpdate {
                        status: Some(UploadStatus::Failed),
                        error: Some(descriptor.message.clone()),
                        ..Default::default()
                    },
                )
                .await;
            self.handlers.emit_error(&descriptor);
            return Err(err);
        }

        Ok(())
    }

    /// 暂停。同步信号，不等待传输层确认
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let handle = inner.handle.as_mut().ok_or(UploadError::NotStarted)?;

        handle.pause();
        inner.status = UploadStatus::Paused;
        drop(inner);

        self.store
            .update(self.id, UploadUpdate::status(UploadStatus::Paused))
            .await;

        Ok(())
    }

    /// 恢复。取决于传输层能力，可能等价于对已协商 URL 的重新 start
    pub async fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.handle.is_none() {
            return Err(UploadError::NotStarted);
        }

        inner.status = UploadStatus::Uploading;
        self.store
            .update(self.id, UploadUpdate::status(UploadStatus::Uploading))
            .await;

        let handle = inner.handle.as_mut().ok_or(UploadError::NotStarted)?;
        if let Err(err) = handle.resume().await {
            let descriptor = err.as_transport_error(codes::UPLOAD_SCHEDULE_FAILED);
            inner.status = UploadStatus::Failed;
            self.store
                .update(
                    self.id,
                    UploadUpdate {
                        status: Some(UploadStatus::Failed),
                        error: Some(descriptor.message.clone()),
                        ..Default::default()
                    },
                )
                .await;
            self.handlers.emit_error(&descriptor);
            return Err(err);
        }

        Ok(())
    }

    /// 中止。未 start 过的会话是静默 no-op（调用方可能防御性调用）；
    /// 传输层取消失败只记日志不上抛。completed 不会被改回 failed
    pub async fn abort(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(handle) = inner.handle.as_mut() else {
            return Ok(());
        };

        if let Err(err) = handle.abort().await {
            warn!(upload_id = %self.id, "transport abort failed: {err}");
        }

        if inner.status != UploadStatus::Completed {
            inner.status = UploadStatus::Failed;
            self.store
                .update(self.id, UploadUpdate::status(UploadStatus::Failed))
                .await;
        }

        Ok(())
    }

    /// 最近一次进度快照；从未 start 过返回 None
    pub async fn progress(&self) -> Option<ProgressSnapshot> {
        self.inner.lock().await.progress
    }

    /// 同一文件且 URL 已协商的历史上传
    pub async fn find_previous_uploads(&self) -> Vec<PreviousUpload> {
        self.store.find_by_file(&self.file_path).await
    }

    /// 采用历史记录的 URL，下一次 start() 走协议层续传而不是重新创建
    pub async fn resume_from_previous_upload(&self, previous: &PreviousUpload) {
        self.inner.lock().await.upload_url = Some(previous.upload_url.clone());
    }

    pub fn on_progress(&self, handler: ProgressHandler) {
        self.handlers.on_progress(handler);
    }

    pub fn off_progress(&self, handler: Option<&ProgressHandler>) {
        self.handlers.off_progress(handler);
    }

    pub fn on_success(&self, handler: SuccessHandler) {
        self.handlers.on_success(handler);
    }

    pub fn off_success(&self, handler: Option<&SuccessHandler>) {
        self.handlers.off_success(handler);
    }

    pub fn on_error(&self, handler: ErrorHandler) {
        self.handlers.on_error(handler);
    }

    pub fn off_error(&self, handler: Option<&ErrorHandler>) {
        self.handlers.off_error(handler);
    }

    pub fn on_chunk_complete(&self, handler: ChunkCompleteHandler) {
        self.handlers.on_chunk_complete(handler);
    }

    pub fn off_chunk_complete(&self, handler: Option<&ChunkCompleteHandler>) {
        self.handlers.off_chunk_complete(handler);
    }

    /// 消费传输事件：更新会话快照 -> 分发给订阅者 -> 写回 Store。
    /// 单个会话内事件按传输层产生的顺序处理，不合并不丢弃
    fn spawn_pump(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
        let id = self.id;
        let store = self.store.clone();
        let handlers = self.handlers.clone();
        let inner = self.inner.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Progress {
                        bytes_uploaded,
                        bytes_total,
                    } => {
                        let progress = ProgressSnapshot::new(bytes_uploaded, bytes_total);
                        inner.lock().await.progress = Some(progress);
                        handlers.emit_progress(&progress);
                        store.update(id, UploadUpdate::offset(bytes_uploaded)).await;
                    }
                    TransportEvent::ChunkComplete {
                        chunk_size,
                        bytes_uploaded,
                        bytes_total,
                    } => {
                        handlers.emit_chunk_complete(&ChunkProgress {
                            chunk_size,
                            bytes_uploaded,
                            bytes_total,
                        });
                    }
                    TransportEvent::Success { upload_url } => {
                        {
                            let mut inner = inner.lock().await;
                            inner.status = UploadStatus::Completed;
                            inner.upload_url = Some(upload_url.clone());
                        }
                        handlers.emit_success(&upload_url);
                        store
                            .update(
                                id,
                                UploadUpdate {
                                    status: Some(UploadStatus::Completed),
                                    url: Some(upload_url),
                                    ..Default::default()
                                },
                            )
                            .await;
                    }
                    TransportEvent::Error(descriptor) => {
                        inner.lock().await.status = UploadStatus::Failed;
                        handlers.emit_error(&descriptor);
                        store
                            .update(
                                id,
                                UploadUpdate {
                                    status: Some(UploadStatus::Failed),
                                    error: Some(descriptor.message.clone()),
                                    ..Default::default()
                                },
                            )
                            .await;
                    }
                }
            }
        })
    }
}
