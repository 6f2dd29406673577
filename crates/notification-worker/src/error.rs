//! 通知工作者错误类型
//!
//! 区分"注册失败"（尽力而为，记录后继续）与"确认发布失败"
//! （请求级致命，消息保持未提交以便重投）两类渠道故障。

use reservation_shared::error::ReservationError;

/// 通知处理错误
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// 渠道提供方未接受确认发布，消息将被重投
    #[error("确认发布失败: {reason}")]
    ConfirmationRejected { reason: String },

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] ReservationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotifyError::ConfirmationRejected {
            reason: "provider 返回 503".to_string(),
        };
        assert_eq!(err.to_string(), "确认发布失败: provider 返回 503");

        let shared_err = ReservationError::Decode("invalid JSON".to_string());
        let err = NotifyError::Shared(shared_err);
        assert_eq!(err.to_string(), "消息解码失败: invalid JSON");
    }
}
