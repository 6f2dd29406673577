//! Kafka 基础设施封装
//!
//! 将 rdkafka 的底层 API 封装为业务友好的 Producer/Consumer 抽象，
//! 统一消息序列化、错误映射和优雅关闭语义，避免各服务重复编写样板代码。
//!
//! 消费侧关闭自动提交，改为按批手动提交偏移：处理函数报告整批处理完成
//! 后才提交，失败的批次保持未提交，由 Kafka 在重平衡或重启后重投，
//! 构成管道的至少一次投递保证。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Offset, TopicPartitionList};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{ConsumerConfig, KafkaConfig};
use crate::error::ReservationError;

// ---------------------------------------------------------------------------
// Topic 常量
// ---------------------------------------------------------------------------

/// 集中管理所有 Kafka topic 名称，防止字符串散落在各服务中导致拼写不一致
pub mod topics {
    /// 存储队列：网关扇出的第一条投递路径，由存储消费者落库
    pub const RESERVATION_STORE: &str = "reservation.store";
    /// 通知队列：网关扇出的第二条投递路径，由通知消费者发送确认
    pub const RESERVATION_NOTIFY: &str = "reservation.notify";
    /// 解码失败的消息投递到死信队列，供后续排查，不再重投
    pub const DEAD_LETTER_QUEUE: &str = "reservation.dlq";
}

// ---------------------------------------------------------------------------
// ConsumerMessage
// ---------------------------------------------------------------------------

/// 消费到的 Kafka 消息的统一表示
///
/// 将 rdkafka 的 `BorrowedMessage`（带生命周期约束）转换为拥有所有权的结构体，
/// 使消息可以安全地跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl ConsumerMessage {
    /// 从 rdkafka 的借用消息构造，提取并拥有所有字段
    fn from_borrowed(msg: &BorrowedMessage<'_>) -> Self {
        let key = msg
            .key()
            .and_then(|k| std::str::from_utf8(k).ok())
            .map(String::from);

        let payload = msg.payload().map(|p| p.to_vec()).unwrap_or_default();

        let timestamp = msg.timestamp().to_millis();

        let mut headers = HashMap::new();
        if let Some(h) = msg.headers() {
            for idx in 0..h.count() {
                let header = h.get(idx);
                if let Some(raw) = header.value
                    && let Ok(value) = std::str::from_utf8(raw)
                {
                    headers.insert(header.key.to_string(), value.to_string());
                }
            }
        }

        Self {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key,
            payload,
            timestamp,
            headers,
        }
    }

    /// 将负载视为 UTF-8 字符串返回
    pub fn payload_str(&self) -> Result<&str, ReservationError> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| ReservationError::Decode(format!("负载非 UTF-8 编码: {e}")))
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, ReservationError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| ReservationError::Decode(format!("负载反序列化失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// KafkaProducer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 生产者
///
/// 封装 `FutureProducer` 并提供类型安全的 JSON 发送方法，
/// 内部已派生 Clone（`FutureProducer` 本身是 Arc 包装的）。
#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    /// 根据配置创建生产者
    ///
    /// 设置 `message.timeout.ms` 为 5 秒——网关在 5 秒内无法投递即向
    /// 调用方报错，由客户端决定是否重试，而非无限等待。
    pub fn new(config: &KafkaConfig) -> Result<Self, ReservationError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| ReservationError::Kafka(format!("创建生产者失败: {e}")))?;

        info!(brokers = %config.brokers, "Kafka 生产者已初始化");
        Ok(Self { producer })
    }

    /// 发送原始字节消息
    pub async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<(i32, i64), ReservationError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        // rdkafka 0.39+ 返回 Delivery 结构体而非元组
        let delivery = self
            .producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| ReservationError::Kafka(format!("发送消息失败: {e}")))?;

        debug!(
            topic,
            key,
            partition = delivery.partition,
            offset = delivery.offset,
            "消息已发送"
        );
        Ok((delivery.partition, delivery.offset))
    }

    /// 将值序列化为 JSON 后发送
    ///
    /// 序列化与网络发送拆分为两步，便于独立定位故障原因。
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(i32, i64), ReservationError> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| ReservationError::Kafka(format!("序列化失败: {e}")))?;

        self.send(topic, key, &payload).await
    }
}

// ---------------------------------------------------------------------------
// DeadLetterSink
// ---------------------------------------------------------------------------

/// 死信投递抽象
///
/// 解码失败的消息重试也不会成功，消费者将其原样转投到死信队列后
/// 视为已处理，不再阻塞批次提交。测试中用记录型替身捕获投递内容。
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// 将消息原始负载转投到死信队列
    async fn dead_letter(&self, msg: &ConsumerMessage) -> Result<(), ReservationError>;
}

#[async_trait]
impl DeadLetterSink for KafkaProducer {
    async fn dead_letter(&self, msg: &ConsumerMessage) -> Result<(), ReservationError> {
        let key = msg.key.as_deref().unwrap_or_default();
        self.send(topics::DEAD_LETTER_QUEUE, key, &msg.payload)
            .await
            .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// KafkaConsumer
// ---------------------------------------------------------------------------

/// 面向业务的 Kafka 消费者
///
/// 封装 `StreamConsumer`，提供按批拉取、手动提交和基于 `watch` channel
/// 的优雅关闭语义，确保进程退出时不会丢失正在处理的消息。
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// 创建消费者
    ///
    /// `group_id_suffix` 允许同一服务内不同消费逻辑使用独立的消费组，
    /// 例如 "reservation-pipeline.store" 和 "reservation-pipeline.notify"。
    pub fn new(
        config: &KafkaConfig,
        group_id_suffix: Option<&str>,
    ) -> Result<Self, ReservationError> {
        let group_id = match group_id_suffix {
            Some(suffix) => format!("{}.{}", config.consumer_group, suffix),
            None => config.consumer_group.clone(),
        };

        // 自动提交关闭：偏移只在整批处理完成后手动提交，
        // 处理失败的批次保持未提交以便重投
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| ReservationError::Kafka(format!("创建消费者失败: {e}")))?;

        info!(brokers = %config.brokers, group_id, "Kafka 消费者已初始化");
        Ok(Self { consumer })
    }

    /// 订阅指定的 topic 列表
    pub fn subscribe(&self, topics: &[&str]) -> Result<(), ReservationError> {
        self.consumer
            .subscribe(topics)
            .map_err(|e| ReservationError::Kafka(format!("订阅 topic 失败: {e}")))?;

        info!(?topics, "已订阅 Kafka topics");
        Ok(())
    }

    /// 启动按批消费循环
    ///
    /// 收到首条消息后最多等待 `max_wait_ms` 凑齐 `batch_size` 条，随后整批
    /// 交给 handler。使用 `tokio::select!` 同时监听消息流和关闭信号：
    /// - handler 返回 Ok 时提交该批偏移；返回 Err 只记录日志不提交，
    ///   未提交的消息在重平衡或重启后由 Kafka 重投（至少一次）。
    /// - 关闭信号变为 `true` 时退出循环，确保正在执行的 handler 能自然完成。
    pub async fn start_batches<F, Fut, E>(
        self,
        batching: ConsumerConfig,
        mut shutdown: watch::Receiver<bool>,
        handler: F,
    ) where
        F: Fn(Vec<ConsumerMessage>) -> Fut,
        Fut: std::future::Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        use futures::StreamExt;

        let stream = self.consumer.stream();
        futures::pin_mut!(stream);

        info!(
            batch_size = batching.batch_size,
            max_wait_ms = batching.max_wait_ms,
            "Kafka 消费循环已启动"
        );

        'main: loop {
            // 等待批次的首条消息
            let first = tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，Kafka 消费循环退出");
                        break 'main;
                    }
                    continue 'main;
                }

                msg_result = stream.next() => {
                    let Some(msg_result) = msg_result else {
                        warn!("Kafka 消息流意外结束");
                        break 'main;
                    };

                    match msg_result {
                        Ok(borrowed_msg) => ConsumerMessage::from_borrowed(&borrowed_msg),
                        Err(e) => {
                            error!(error = %e, "接收 Kafka 消息出错");
                            continue 'main;
                        }
                    }
                }
            };

            let mut batch = vec![first];

            // 在等待窗口内继续凑批，窗口结束或批满即止
            let deadline = Instant::now() + Duration::from_millis(batching.max_wait_ms);
            while batch.len() < batching.batch_size {
                let next = tokio::time::timeout_at(deadline, stream.next()).await;
                match next {
                    Ok(Some(Ok(borrowed_msg))) => {
                        batch.push(ConsumerMessage::from_borrowed(&borrowed_msg));
                    }
                    Ok(Some(Err(e))) => {
                        error!(error = %e, "接收 Kafka 消息出错");
                    }
                    // 流结束：处理完手头的批次后退出
                    Ok(None) => break,
                    // 等待窗口结束
                    Err(_) => break,
                }
            }

            debug!(
                batch_len = batch.len(),
                topic = %batch[0].topic,
                "批次已就绪"
            );

            match handler(batch.clone()).await {
                Ok(()) => {
                    if let Err(e) = self.commit(&batch) {
                        error!(error = %e, "提交偏移失败，批次可能被重投");
                    }
                }
                Err(e) => {
                    // 不提交偏移：整批在重平衡或重启后重投
                    warn!(error = %e, batch_len = batch.len(), "批次处理失败，保持未提交");
                }
            }
        }
    }

    /// 提交一批消息的偏移
    ///
    /// 对每个 (topic, partition) 提交批内最大偏移 + 1。
    fn commit(&self, batch: &[ConsumerMessage]) -> Result<(), ReservationError> {
        let mut watermarks: HashMap<(String, i32), i64> = HashMap::new();
        for msg in batch {
            let entry = watermarks
                .entry((msg.topic.clone(), msg.partition))
                .or_insert(msg.offset);
            if msg.offset > *entry {
                *entry = msg.offset;
            }
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in &watermarks {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))
                .map_err(|e| ReservationError::Kafka(format!("构造偏移列表失败: {e}")))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| ReservationError::Kafka(format!("提交偏移失败: {e}")))
    }
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_constants() {
        assert_eq!(topics::RESERVATION_STORE, "reservation.store");
        assert_eq!(topics::RESERVATION_NOTIFY, "reservation.notify");
        assert_eq!(topics::DEAD_LETTER_QUEUE, "reservation.dlq");
    }

    #[test]
    fn test_consumer_message_creation() {
        let msg = ConsumerMessage {
            topic: "test-topic".to_string(),
            partition: 0,
            offset: 42,
            key: Some("ann@x.com".to_string()),
            payload: b"hello".to_vec(),
            timestamp: Some(1_700_000_000_000),
            headers: HashMap::from([("trace-id".to_string(), "abc-123".to_string())]),
        };

        assert_eq!(msg.topic, "test-topic");
        assert_eq!(msg.partition, 0);
        assert_eq!(msg.offset, 42);
        assert_eq!(msg.key.as_deref(), Some("ann@x.com"));
        assert_eq!(msg.payload, b"hello");
        assert_eq!(msg.timestamp, Some(1_700_000_000_000));
        assert_eq!(msg.headers.get("trace-id").unwrap(), "abc-123");
    }

    #[test]
    fn test_consumer_message_deserialize() {
        use crate::envelope::ReservationEnvelope;

        let envelope_json =
            r#"{"name":"Ann","email":"ann@x.com","quantity":2,"reservation_time":"7:00 PM","restaurant_name":"Cafe Nord"}"#;
        let msg = ConsumerMessage {
            topic: topics::RESERVATION_STORE.to_string(),
            partition: 1,
            offset: 100,
            key: None,
            payload: envelope_json.as_bytes().to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let envelope: ReservationEnvelope = msg.deserialize_payload().unwrap();
        assert_eq!(envelope.name, "Ann");
        assert_eq!(envelope.email, "ann@x.com");
        assert_eq!(envelope.quantity, 2);
    }

    #[test]
    fn test_consumer_message_deserialize_invalid_json() {
        let msg = ConsumerMessage {
            topic: topics::RESERVATION_STORE.to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: b"not json".to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let result: Result<serde_json::Value, _> = msg.deserialize_payload();
        assert!(matches!(result, Err(ReservationError::Decode(_))));
    }

    #[test]
    fn test_consumer_message_payload_str() {
        let msg = ConsumerMessage {
            topic: "test".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: b"hello world".to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        assert_eq!(msg.payload_str().unwrap(), "hello world");
    }

    #[test]
    fn test_consumer_message_payload_str_invalid_utf8() {
        let msg = ConsumerMessage {
            topic: "test".to_string(),
            partition: 0,
            offset: 0,
            key: None,
            payload: vec![0xFF, 0xFE],
            timestamp: None,
            headers: HashMap::new(),
        };

        assert!(msg.payload_str().is_err());
    }
}
