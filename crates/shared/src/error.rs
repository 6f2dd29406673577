//! 统一错误处理模块
//!
//! 定义管道内所有共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 错误分类直接决定重试语义：可重试的错误通过消费失败触发队列重投，
//! 不可重试的错误（校验、解码）立即反馈或进入死信队列。

use thiserror::Error;

/// 管道错误类型
#[derive(Debug, Error)]
pub enum ReservationError {
    // ==================== 入口校验错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 队列发布错误 ====================
    #[error("消息发布失败: queue={queue}, 原因: {reason}")]
    Publish { queue: String, reason: String },

    // ==================== 消息解码错误 ====================
    #[error("消息解码失败: {0}")]
    Decode(String),

    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    // ==================== 通知渠道错误 ====================
    #[error("通知渠道错误: {0}")]
    Channel(String),

    // ==================== Kafka 基础设施错误 ====================
    #[error("Kafka 错误: {0}")]
    Kafka(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, ReservationError>;

impl ReservationError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Publish { .. } => "PUBLISH_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Database(_) => "STORE_WRITE_ERROR",
            Self::Channel(_) => "CHANNEL_ERROR",
            Self::Kafka(_) => "KAFKA_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 可重试错误以消费失败的形式上抛，由队列基础设施整条消息重投
    /// （至少一次投递）；校验与解码错误重试也不会成功，直接拒绝或死信。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Publish { .. } | Self::Database(_) | Self::Channel(_) | Self::Kafka(_)
        )
    }
}
