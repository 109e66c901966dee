use std::path::Path;
use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::errors::{Result, TransportError};
use crate::types::{ProgressSnapshot, UploadOptions};

/// 传输层事件，原生回调（onProgress/onSuccess/onChunkComplete/onError）
/// 统一转换成这个枚举，经 mpsc 通道送回会话
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// 进度更新
    Progress {
        bytes_uploaded: u64,
        bytes_total: u64,
    },

    /// 单个分块完成
    ChunkComplete {
        chunk_size: u64,
        bytes_uploaded: u64,
        bytes_total: u64,
    },

    /// 上传完成，携带服务端最终的资源 URL
    Success { upload_url: String },

    /// 传输失败
    Error(TransportError),
}

/// 传输协作者 - 实际的 TUS 分块传输由它完成，本层只做状态协调
#[async_trait]
pub trait Transport: Send + Sync {
    /// 为一个文件构造上传。`upload_url` 非空时表示之前协商过的资源位置，
    /// 传输层应尝试协议层续传而不是重新创建。
    /// 文件不可读或配置非法时返回 `TransportCreation`。
    async fn create(
        &self,
        file_path: &Path,
        options: &UploadOptions,
        upload_url: Option<&str>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn TransportHandle>>;
}

/// 单次上传的传输句柄
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// 开始传输；返回表示传输已被接受/调度，完成由 Success/Error 事件通知
    async fn start(&mut self) -> Result<()>;

    /// 同步尽力而为的暂停，不等待传输层确认
    fn pause(&mut self);

    /// 恢复传输，部分实现等价于对已协商 URL 的重新 start
    async fn resume(&mut self) -> Result<()>;

    /// 尽力而为的取消，已提交的分块不回滚
    async fn abort(&mut self) -> Result<()>;

    /// 传输层视角的进度
    fn progress(&self) -> ProgressSnapshot;
}
