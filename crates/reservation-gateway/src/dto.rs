//! 网关请求/响应 DTO 定义

use reservation_shared::envelope::ReservationEnvelope;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 创建预订请求
///
/// 线上 JSON 键名与信封一致（snake_case）。校验在网关侧强制执行：
/// 原始系统把字段校验留给前端，这里收紧为服务端校验，
/// 校验失败不会触发任何发布。
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, message = "姓名不能为空"))]
    pub name: String,
    #[validate(email(message = "email 格式无效"))]
    pub email: String,
    #[validate(range(min = 1, message = "用餐人数必须为正整数"))]
    pub quantity: u32,
    #[validate(length(min = 1, message = "预订时间不能为空"))]
    pub reservation_time: String,
    #[validate(length(min = 1, message = "餐厅名称不能为空"))]
    pub restaurant_name: String,
}

impl From<CreateReservationRequest> for ReservationEnvelope {
    fn from(req: CreateReservationRequest) -> Self {
        ReservationEnvelope {
            name: req.name,
            email: req.email,
            quantity: req.quantity,
            reservation_time: req.reservation_time,
            restaurant_name: req.restaurant_name,
        }
    }
}

/// 成功响应：只携带提示消息，不返回额外负载
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateReservationRequest {
        CreateReservationRequest {
            name: "Ann".to_string(),
            email: "ann@x.com".to_string(),
            quantity: 2,
            reservation_time: "7:00 PM".to_string(),
            restaurant_name: "Cafe Nord".to_string(),
        }
    }

    #[test]
    fn test_valid_request_passes_validation() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let req = CreateReservationRequest {
            name: String::new(),
            ..valid_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_malformed_email_rejected() {
        let req = CreateReservationRequest {
            email: "not-an-email".to_string(),
            ..valid_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let req = CreateReservationRequest {
            quantity: 0,
            ..valid_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_converts_to_envelope() {
        let envelope: ReservationEnvelope = valid_request().into();
        assert_eq!(envelope.name, "Ann");
        assert_eq!(envelope.email, "ann@x.com");
        assert_eq!(envelope.quantity, 2);
        assert_eq!(envelope.reservation_time, "7:00 PM");
        assert_eq!(envelope.restaurant_name, "Cafe Nord");
    }
}
