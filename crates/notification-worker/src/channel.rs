//! 确认渠道抽象
//!
//! 通过 `ConfirmationChannel` trait 抽象渠道提供方的两个操作：
//! 注册收件人（幂等）与面向全渠道发布消息。当前实现为模拟渠道
//! （内存注册表 + 日志输出），便于在无外部依赖的情况下验证消费管道
//! 的完整性。未来替换为真实邮件订阅服务的 SDK 调用时只需实现同一 trait。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reservation_shared::error::ReservationError;
use tracing::info;
use uuid::Uuid;

/// 注册结果
///
/// 渠道提供方对"重复注册"返回已存在而非错误，调用方据此区分
/// 新建与幂等命中，两者都视为注册成功。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// 本次调用新建了注册
    Created,
    /// 该地址此前已注册，本次为无操作
    AlreadySubscribed,
}

/// 发布回执
///
/// 渠道提供方接受发布即算成功，不追踪单个收件人是否实际收到。
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// 渠道提供方返回的消息标识，用于追踪投递状态
    pub message_id: String,
}

/// 确认渠道 trait
///
/// `publish` 面向整个渠道广播而非指定单个注册者：注册传播存在延迟，
/// 刚注册的收件人可能错过紧随其后的发布。这是渠道模型接受的限制。
#[async_trait]
pub trait ConfirmationChannel: Send + Sync {
    /// 将邮箱地址注册到渠道，幂等
    async fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, ReservationError>;

    /// 面向全渠道发布一条消息
    async fn publish(&self, subject: &str, body: &str)
    -> Result<PublishReceipt, ReservationError>;
}

// ---------------------------------------------------------------------------
// 模拟邮件渠道
// ---------------------------------------------------------------------------

/// 模拟邮件确认渠道
///
/// 注册表保存在进程内存中（按邮箱去重），发布仅记录日志。
/// 生产环境中替换为邮件订阅服务（如 SES topic / SNS）的 API 调用。
pub struct EmailTopicChannel {
    /// 邮箱 -> 注册时间
    subscribers: DashMap<String, DateTime<Utc>>,
}

impl EmailTopicChannel {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// 当前注册数，供日志与测试观察
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for EmailTopicChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfirmationChannel for EmailTopicChannel {
    async fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, ReservationError> {
        if self.subscribers.contains_key(email) {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        self.subscribers.insert(email.to_string(), Utc::now());
        info!(email, "收件人已注册到确认渠道");
        Ok(SubscribeOutcome::Created)
    }

    async fn publish(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<PublishReceipt, ReservationError> {
        let message_id = Uuid::now_v7().to_string();

        info!(
            message_id = %message_id,
            subject,
            body,
            subscribers = self.subscriber_count(),
            "模拟向确认渠道发布消息"
        );

        Ok(PublishReceipt { message_id })
    }
}
