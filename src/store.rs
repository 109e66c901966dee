use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;
use crate::errors::Result;
use crate::types::{PreviousUpload, UploadId, UploadMetadata, UploadUpdate};

/// 存储适配器 - 整张记录表的保存与恢复。
/// 本层只规定存什么、什么时候存，存储引擎内部由实现决定。
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn save(&self, records: &HashMap<UploadId, UploadMetadata>) -> Result<()>;
    async fn load(&self) -> Result<HashMap<UploadId, UploadMetadata>>;
}

/// JSON 文件存储
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn save(&self, records: &HashMap<UploadId, UploadMetadata>) -> Result<()> {
        let data = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }

    async fn load(&self) -> Result<HashMap<UploadId, UploadMetadata>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        Ok(serde_json::from_str(&data)?)
    }
}

/// 内存存储，用于测试或关闭持久化的场景
#[derive(Default)]
pub struct MemoryBackend {
    records: parking_lot::RwLock<HashMap<UploadId, UploadMetadata>>,
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn save(&self, records: &HashMap<UploadId, UploadMetadata>) -> Result<()> {
        *self.records.write() = records.clone();
        Ok(())
    }

    async fn load(&self) -> Result<HashMap<UploadId, UploadMetadata>> {
        Ok(self.records.read().clone())
    }
}

/// 持久化的上传记录表，key 是 UploadId，进程重启后可恢复。
/// 每次变更都会把整张表写回 backend；写失败只记日志，
/// 内存里的状态仍然是权威的。
pub struct UploadStore {
    records: RwLock<HashMap<UploadId, UploadMetadata>>,
    backend: Box<dyn StorageBackend>,
}

impl UploadStore {
    /// 从 backend 恢复记录表。损坏的落盘数据在这里兜底：
    /// 丢弃并从空表开始，不向上传播
    pub async fn open(backend: Box<dyn StorageBackend>) -> Self {
        let records = match backend.load().await {
            Ok(records) => records,
            Err(err) => {
                warn!("discarding unreadable upload state: {err}");
                HashMap::new()
            }
        };

        Self {
            records: RwLock::new(records),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            backend: Box::new(MemoryBackend::default()),
        }
    }

    /// 插入记录；重复 id 直接覆盖，不报错
    pub async fn add(&self, record: UploadMetadata) {
        let mut records = self.records.write().await;
        records.insert(record.id, record);
        self.persist(&records).await;
    }

    /// 合并部分字段并刷新 updated_at。id 不存在时静默忽略，
    /// update 与删除竞争是预期内的
    pub async fn update(&self, id: UploadId, update: UploadUpdate) -> Option<UploadMetadata> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return None;
        };

        record.apply(update);
        let updated = record.clone();
        self.persist(&records).await;

        Some(updated)
    }

    /// 删除记录；id 不存在时为 no-op
    pub async fn remove(&self, id: UploadId) {
        let mut records = self.records.write().await;
        if records.remove(&id).is_some() {
            self.persist(&records).await;
        }
    }

    pub async fn get(&self, id: UploadId) -> Option<UploadMetadata> {
        self.records.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<UploadMetadata> {
        self.records.read().await.values().cloned().collect()
    }

    /// pending/uploading 状态的记录
    pub async fn list_active(&self) -> Vec<UploadMetadata> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.status.is_active())
            .cloned()
            .collect()
    }

    /// 同一文件且 URL 已协商的历史记录，续传发现用
    pub async fn find_by_file(&self, file_path: &Path) -> Vec<PreviousUpload> {
        self.records
            .read()
            .await
            .values()
            .filter(|record| record.file_path == file_path)
            .filter_map(|record| {
                record.url.as_ref().map(|url| PreviousUpload {
                    upload_id: record.id,
                    upload_url: url.clone(),
                    file_path: record.file_path.clone(),
                    upload_size: record.upload_size,
                    offset: record.offset,
                })
            })
            .collect()
    }

    /// 清除所有 completed 状态的记录
    pub async fn clear_completed(&self) {
        let mut records = self.records.write().await;
        records.retain(|_, record| record.status != crate::types::UploadStatus::Completed);
        self.persist(&records).await;
    }

    pub async fn clear_all(&self) {
        let mut records = self.records.write().await;
        records.clear();
        self.persist(&records).await;
    }

    async fn persist(&self, records: &HashMap<UploadId, UploadMetadata>) {
        // 持久化是优化项不是执行依赖，失败只记日志
        if let Err(err) = self.backend.save(records).await {
            warn!("failed to persist upload state: {err}");
        }
    }
}
