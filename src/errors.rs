use thiserror::Error;

/// 传输层错误码（落盘/事件中携带的 wire code）
pub mod codes {
    /// 传输过程中失败
    pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";
    /// 调度/创建阶段失败
    pub const UPLOAD_SCHEDULE_FAILED: &str = "UPLOAD_SCHEDULE_FAILED";
}

/// 统一的传输错误描述，原生回调的错误都包装成这个形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub code: String,
    pub message: String,
    pub original_error: Option<String>,
}

impl TransportError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            original_error: None,
        }
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original_error = Some(original.into());
        self
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(original) = &self.original_error {
            write!(f, " (caused by: {})", original)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    /// pause/resume 需要已创建的传输句柄
    #[error("Upload has not been started")]
    NotStarted,

    #[error("Failed to create transport upload: {0}")]
    TransportCreation(String),

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn transport_creation(message: impl Into<String>) -> Self {
        Self::TransportCreation(message.into())
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::new(codes::UPLOAD_FAILED, message))
    }

    pub fn schedule_failed(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::new(codes::UPLOAD_SCHEDULE_FAILED, message))
    }

    /// 转成事件通道里分发的错误描述
    pub fn as_transport_error(&self, fallback_code: &str) -> TransportError {
        match self {
            Self::Transport(descriptor) => descriptor.clone(),
            other => TransportError::new(fallback_code, other.to_string()),
        }
    }
}

impl From<TransportError> for UploadError {
    fn from(descriptor: TransportError) -> Self {
        Self::Transport(descriptor)
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
