//! 预订确认消息组装
//!
//! 根据信封内容生成确认消息的标题与正文。当前使用硬编码模板以降低
//! 外部依赖，未来可扩展为从配置中心动态加载模板。

use reservation_shared::envelope::ReservationEnvelope;

/// 组装完成的确认消息
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub subject: String,
    pub body: String,
}

/// 从信封组装确认消息
///
/// 标题保持简洁固定，便于收件端聚合展示同类邮件；
/// 正文嵌入姓名、餐厅、时间与人数四个关键字段。
pub fn compose(envelope: &ReservationEnvelope) -> Confirmation {
    Confirmation {
        subject: "预订确认".to_string(),
        body: format!(
            "{} 您好，您在「{}」{} 的预订已成功，共 {} 位用餐。",
            envelope.name, envelope.restaurant_name, envelope.reservation_time, envelope.quantity
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_embeds_all_key_fields() {
        let envelope = ReservationEnvelope::new("Ann", "ann@x.com", 2, "7:00 PM", "Cafe Nord");

        let confirmation = compose(&envelope);

        assert_eq!(confirmation.subject, "预订确认");
        // 正文必须包含姓名、餐厅、时间与人数
        assert!(confirmation.body.contains("Ann"));
        assert!(confirmation.body.contains("Cafe Nord"));
        assert!(confirmation.body.contains("7:00 PM"));
        assert!(confirmation.body.contains('2'));
    }

    #[test]
    fn test_compose_does_not_leak_email() {
        // 确认面向全渠道广播，正文不应包含单个收件人的邮箱地址
        let envelope = ReservationEnvelope::new("Ann", "ann@x.com", 2, "7:00 PM", "Cafe Nord");

        let confirmation = compose(&envelope);
        assert!(!confirmation.body.contains("ann@x.com"));
    }
}
