use std::sync::Arc;
use parking_lot::Mutex;
use crate::errors::TransportError;
use crate::types::{ChunkProgress, ProgressSnapshot};

pub type ProgressHandler = Arc<dyn Fn(&ProgressSnapshot) + Sync + Send>;
pub type SuccessHandler = Arc<dyn Fn(&str) + Sync + Send>;
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Sync + Send>;
pub type ChunkCompleteHandler = Arc<dyn Fn(&ChunkProgress) + Sync + Send>;

/// 会话构造时注入的初始回调，与 on_xxx 注册的回调合并进同一个注册表
#[derive(Default, Clone)]
pub struct SessionCallbacks {
    pub on_progress: Option<ProgressHandler>,
    pub on_success: Option<SuccessHandler>,
    pub on_error: Option<ErrorHandler>,
    pub on_chunk_complete: Option<ChunkCompleteHandler>,
}

/// 四个强类型事件通道，每个通道各自维护订阅者集合。
/// 同一个 Arc 重复注册是幂等的；off 不带 handler 清空整个通道。
#[derive(Default)]
pub struct HandlerRegistry {
    progress: Mutex<Vec<ProgressHandler>>,
    success: Mutex<Vec<SuccessHandler>>,
    error: Mutex<Vec<ErrorHandler>>,
    chunk_complete: Mutex<Vec<ChunkCompleteHandler>>,
}

fn add_handler<T: ?Sized>(list: &Mutex<Vec<Arc<T>>>, handler: Arc<T>) {
    let mut handlers = list.lock();
    if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
        handlers.push(handler);
    }
}

fn remove_handler<T: ?Sized>(list: &Mutex<Vec<Arc<T>>>, handler: Option<&Arc<T>>) {
    let mut handlers = list.lock();
    match handler {
        Some(target) => handlers.retain(|h| !Arc::ptr_eq(h, target)),
        None => handlers.clear(),
    }
}

/// 分发时先克隆订阅者列表再调用，回调里可以安全地再注册/注销
fn snapshot<T: ?Sized>(list: &Mutex<Vec<Arc<T>>>) -> Vec<Arc<T>> {
    list.lock().clone()
}

impl HandlerRegistry {
    pub fn new(callbacks: SessionCallbacks) -> Self {
        let registry = Self::default();
        registry.merge(callbacks);
        registry
    }

    pub fn merge(&self, callbacks: SessionCallbacks) {
        if let Some(handler) = callbacks.on_progress {
            self.on_progress(handler);
        }
        if let Some(handler) = callbacks.on_success {
            self.on_success(handler);
        }
        if let Some(handler) = callbacks.on_error {
            self.on_error(handler);
        }
        if let Some(handler) = callbacks.on_chunk_complete {
            self.on_chunk_complete(handler);
        }
    }

    pub fn on_progress(&self, handler: ProgressHandler) {
        add_handler(&self.progress, handler);
    }

    pub fn off_progress(&self, handler: Option<&ProgressHandler>) {
        remove_handler(&self.progress, handler);
    }

    pub fn on_success(&self, handler: SuccessHandler) {
        add_handler(&self.success, handler);
    }

    pub fn off_success(&self, handler: Option<&SuccessHandler>) {
        remove_handler(&self.success, handler);
    }

    pub fn on_error(&self, handler: ErrorHandler) {
        add_handler(&self.error, handler);
    }

    pub fn off_error(&self, handler: Option<&ErrorHandler>) {
        remove_handler(&self.error, handler);
    }

    pub fn on_chunk_complete(&self, handler: ChunkCompleteHandler) {
        add_handler(&self.chunk_complete, handler);
    }

    pub fn off_chunk_complete(&self, handler: Option<&ChunkCompleteHandler>) {
        remove_handler(&self.chunk_complete, handler);
    }

    pub fn emit_progress(&self, progress: &ProgressSnapshot) {
        for handler in snapshot(&self.progress) {
            handler(progress);
        }
    }

    pub fn emit_success(&self, upload_url: &str) {
        for handler in snapshot(&self.success) {
            handler(upload_url);
        }
    }

    pub fn emit_error(&self, error: &TransportError) {
        for handler in snapshot(&self.error) {
            handler(error);
        }
    }

    pub fn emit_chunk_complete(&self, chunk: &ChunkProgress) {
        for handler in snapshot(&self.chunk_complete) {
            handler(chunk);
        }
    }
}
