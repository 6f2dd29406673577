//! 存储工作者专用错误类型
//!
//! 在共享库 ReservationError 基础上定义本服务特有的错误变体：
//! 批内写库失败以聚合形式上抛，使消费循环据此保持整批未提交。

use reservation_shared::error::ReservationError;

/// 存储批处理错误
#[derive(Debug, thiserror::Error)]
pub enum StoreWorkerError {
    /// 批内至少一条记录写库失败，整批不提交偏移，由队列重投
    #[error("批次写库失败: {failed}/{total} 条未写入")]
    BatchWriteFailed { failed: usize, total: usize },

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] ReservationError),
}
