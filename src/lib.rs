//! 可断点续传上传的客户端协调层。
//!
//! 跟踪多个进行中的上传，持久化足够的元数据以便进程重启/断网后恢复，
//! 并对外暴露统一的生命周期与事件 API。实际的 TUS 分块传输、
//! OS 后台执行和存储引擎内部都在 trait 接缝之后，由协作者实现。

pub mod background;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

// 重新导出核心类型
pub use background::{BackgroundExecutor, BackgroundOptions, NoopBackgroundExecutor};
pub use coordinator::{AppLifecycleEvent, CoordinatorOptions, UploadCoordinator};
pub use errors::{Result, TransportError, UploadError, codes};
pub use events::{
    ChunkCompleteHandler, ErrorHandler, HandlerRegistry, ProgressHandler, SessionCallbacks,
    SuccessHandler,
};
pub use session::UploadSession;
pub use store::{JsonFileBackend, MemoryBackend, StorageBackend, UploadStore};
pub use transport::{Transport, TransportEvent, TransportHandle};
pub use types::{
    ChunkProgress, PreviousUpload, ProgressSnapshot, UploadId, UploadMetadata, UploadOptions,
    UploadStats, UploadStatus, UploadUpdate,
};
