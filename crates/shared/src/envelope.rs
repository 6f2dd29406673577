//! 预订消息模型
//!
//! 定义在管道中流转的预订信封与落库记录。信封是不可变的工作单元：
//! 网关构造并发布后，消费者只读取、派生新实体，从不修改信封本身。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ReservationEnvelope — 预订信封
// ---------------------------------------------------------------------------

/// 预订信封
///
/// 管道内所有阶段共享的标准消息格式。字段名即线上 JSON 的键名
/// （snake_case），网关、两个消费者与死信队列使用同一份定义，
/// 避免各服务重复声明消息结构导致字段漂移。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationEnvelope {
    /// 预订人姓名
    pub name: String,
    /// 预订人邮箱，同时是通知渠道的注册标识和查询服务的检索键
    pub email: String,
    /// 用餐人数
    pub quantity: u32,
    /// 预订时间，入口处为自由文本，管道不解析其格式
    pub reservation_time: String,
    /// 餐厅名称
    pub restaurant_name: String,
}

impl ReservationEnvelope {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        quantity: u32,
        reservation_time: impl Into<String>,
        restaurant_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            quantity,
            reservation_time: reservation_time.into(),
            restaurant_name: restaurant_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReservationRecord — 落库记录
// ---------------------------------------------------------------------------

/// 持久化的预订记录
///
/// 由存储消费者从信封派生：`id` 在每次持久化尝试时独立生成（UUID v7），
/// 不由客户端提供。同一信封被重复投递时会产生 id 不同的新记录——
/// 管道没有去重键，这是设计上接受的至少一次语义的代价。
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReservationRecord {
    /// 记录唯一标识（UUID v7），时间有序便于索引
    pub id: String,
    pub email: String,
    pub name: String,
    pub quantity: i32,
    pub reservation_time: String,
    pub restaurant_name: String,
    /// 写入时间，查询服务按此字段排序
    pub created_at: DateTime<Utc>,
}

impl ReservationRecord {
    /// 从信封派生一条新记录，生成全新的 id 与写入时间
    ///
    /// 每次调用都产生不同的 id——重试路径依赖这一点产生可观测的
    /// 重复记录，而不是静默覆盖。
    pub fn from_envelope(envelope: &ReservationEnvelope) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            email: envelope.email.clone(),
            name: envelope.name.clone(),
            quantity: envelope.quantity as i32,
            reservation_time: envelope.reservation_time.clone(),
            restaurant_name: envelope.restaurant_name.clone(),
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
