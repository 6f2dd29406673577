//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use crate::publisher::EnvelopePublisher;

/// Axum 应用共享状态
///
/// 发布器以 trait object 持有：生产环境注入 KafkaProducer，
/// 测试注入记录型替身。
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn EnvelopePublisher>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(publisher: Arc<dyn EnvelopePublisher>) -> Self {
        Self { publisher }
    }
}
