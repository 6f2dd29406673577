//! 网关错误类型定义
//!
//! 校验失败属于调用方错误（400，无副作用）；发布失败属于服务端错误
//! （500，可能遗留单边队列消息），响应体按线上契约只含 error 字段。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reservation_shared::error::ReservationError;
use serde_json::json;

/// 网关错误类型
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 请求字段缺失或格式非法，未触发任何发布
    #[error("参数验证失败: {0}")]
    Validation(String),

    /// 至少一条队列发布失败；消息列出失败的队列，
    /// 另一条队列可能已持有消息（不回滚）
    #[error("预订发布失败: {0}")]
    Publish(String),

    /// 透传共享库错误，避免在每个 match 分支手动转换
    #[error(transparent)]
    Shared(#[from] ReservationError),
}

impl GatewayError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Shared(ReservationError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Publish(_) | Self::Shared(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于日志和排查）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Publish(_) => "PUBLISH_ERROR",
            Self::Shared(inner) => inner.code(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 服务端错误记录完整原因，响应体保留可读消息供调用方展示
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "预订请求处理失败");
        }

        let body = json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for GatewayError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
