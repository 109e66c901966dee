use std::collections::HashMap;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 上传任务唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 已创建记录，尚未开始传输
    Pending,
    /// 上传中
    Uploading,
    /// 已暂停
    Paused,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

impl UploadStatus {
    /// pending/uploading 视为活跃，批量恢复只看这两种
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Uploading)
    }
}

/// 可序列化的上传配置。回调函数放在 SessionCallbacks 里，永远不落盘
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOptions {
    pub endpoint: String,
    pub chunk_size: usize,
    /// 重试间隔（毫秒）
    pub retry_delays: Vec<u64>,
    pub headers: HashMap<String, String>,
    /// 转发给服务端的键值标签（如 filename）
    pub metadata: HashMap<String, String>,
    pub store_fingerprint_for_resuming: bool,
    pub remove_fingerprint_on_success: bool,
    pub upload_length_deferred: bool,
    pub override_patch_method: bool,
    pub parallelize: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            chunk_size: 5 * 1024 * 1024, // 5MB
            retry_delays: vec![0, 1000, 3000, 5000],
            headers: HashMap::new(),
            metadata: HashMap::new(),
            store_fingerprint_for_resuming: true,
            remove_fingerprint_on_success: false,
            upload_length_deferred: false,
            override_patch_method: false,
            parallelize: false,
        }
    }
}

/// 一次上传的持久化记录，Store 的基本单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub id: UploadId,
    /// 源文件位置，创建后不可变
    pub file_path: PathBuf,
    /// 服务端分配的资源 URL；首次协商成功前为 None，之后是协议层续传的键
    pub url: Option<String>,
    /// 总字节数，会话创建时固定（延迟长度模式下为 0）
    pub upload_size: u64,
    /// 已确认上传的字节数，进度百分比的唯一依据
    pub offset: u64,
    pub metadata: HashMap<String, String>,
    pub options: UploadOptions,
    pub status: UploadStatus,
    /// 最近一次失败信息
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadMetadata {
    pub fn new(id: UploadId, file_path: PathBuf, upload_size: u64, options: UploadOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_path,
            url: None,
            upload_size,
            metadata: options.metadata.clone(),
            options,
            offset: 0,
            status: UploadStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 合并部分字段。completed 是终态，offset 单调不减且不超过 upload_size
    pub fn apply(&mut self, update: UploadUpdate) {
        if let Some(status) = update.status {
            if self.status != UploadStatus::Completed {
                self.status = status;
            }
        }
        if let Some(offset) = update.offset {
            let capped = if self.options.upload_length_deferred {
                offset
            } else {
                offset.min(self.upload_size)
            };
            self.offset = self.offset.max(capped);
        }
        if let Some(url) = update.url {
            self.url = Some(url);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.updated_at = Utc::now();
    }
}

/// Store::update 的部分字段集合
#[derive(Debug, Clone, Default)]
pub struct UploadUpdate {
    pub status: Option<UploadStatus>,
    pub offset: Option<u64>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadUpdate {
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn offset(offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..Default::default()
        }
    }
}

/// 进度快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
    pub percentage: f64,
}

impl ProgressSnapshot {
    pub fn new(bytes_uploaded: u64, bytes_total: u64) -> Self {
        // bytes_total 为 0 时百分比定义为 0，避免除零
        let percentage = if bytes_total == 0 {
            0.0
        } else {
            bytes_uploaded as f64 / bytes_total as f64 * 100.0
        };

        Self {
            bytes_uploaded,
            bytes_total,
            percentage,
        }
    }
}

/// 单个分块完成的通知，纯观测，不落盘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk_size: u64,
    pub bytes_uploaded: u64,
    pub bytes_total: u64,
}

/// 同一文件的历史上传，URL 已协商，可在协议层续传
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousUpload {
    pub upload_id: UploadId,
    pub upload_url: String,
    pub file_path: PathBuf,
    pub upload_size: u64,
    pub offset: u64,
}

/// 聚合统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub paused: usize,
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<UploadMetadata>();
        assert_send::<ProgressSnapshot>();
        assert_send::<PreviousUpload>();
    }
};
