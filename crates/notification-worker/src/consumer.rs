//! 通知队列消费
//!
//! 将 Kafka 消息解码为预订信封，按"注册 -> 组装 -> 发布"三步发送确认。
//! 注册是尽力而为的：已注册视为成功，其他注册失败只记录日志，绝不
//! 阻塞确认发送；只有确认发布本身失败才让消息保持未提交等待重投。

use std::sync::Arc;

use reservation_shared::config::AppConfig;
use reservation_shared::envelope::ReservationEnvelope;
use reservation_shared::kafka::{
    ConsumerMessage, DeadLetterSink, KafkaConsumer, KafkaProducer, topics,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::channel::{ConfirmationChannel, SubscribeOutcome};
use crate::confirmation;
use crate::error::NotifyError;

/// 通知消费者
///
/// 组合 KafkaConsumer（按批拉取）、ConfirmationChannel（注册与发布）
/// 和 KafkaProducer（死信投递）三个组件，形成完整的通知管道。
/// 批量大小由配置决定，默认单条，与存储消费者各自独立配置。
pub struct NotifyConsumer {
    consumer: KafkaConsumer,
    channel: Arc<dyn ConfirmationChannel>,
    producer: KafkaProducer,
    config: AppConfig,
}

impl NotifyConsumer {
    pub fn new(
        config: &AppConfig,
        channel: Arc<dyn ConfirmationChannel>,
        producer: KafkaProducer,
    ) -> Result<Self, NotifyError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("notify"))?;
        Ok(Self {
            consumer,
            channel,
            producer,
            config: config.clone(),
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), NotifyError> {
        self.consumer.subscribe(&[topics::RESERVATION_NOTIFY])?;

        info!(
            topic = topics::RESERVATION_NOTIFY,
            batch_size = self.config.consumer.batch_size,
            "通知消费者已启动"
        );

        let channel = self.channel;
        let producer = self.producer;
        let batching = self.config.consumer.clone();

        self.consumer
            .start_batches(batching, shutdown, |batch| {
                let channel = &channel;
                let producer = &producer;
                async move { handle_batch(channel.as_ref(), producer, &batch).await }
            })
            .await;

        info!("通知消费者已停止");
        Ok(())
    }
}

/// 处理一批通知队列消息
///
/// 空批次是成功而非错误。条目顺序处理：解码失败转投死信后继续，
/// 确认发布失败立即返回错误使整批（含该条目）保持未提交。
pub async fn handle_batch(
    channel: &dyn ConfirmationChannel,
    dlq: &dyn DeadLetterSink,
    batch: &[ConsumerMessage],
) -> Result<(), NotifyError> {
    if batch.is_empty() {
        info!("没有待处理的通知消息");
        return Ok(());
    }

    for msg in batch {
        handle_message(channel, dlq, msg).await?;
    }

    Ok(())
}

/// 处理单条通知消息的完整流程
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
/// 流程：反序列化 -> 尽力注册收件人 -> 组装确认 -> 全渠道发布
pub async fn handle_message(
    channel: &dyn ConfirmationChannel,
    dlq: &dyn DeadLetterSink,
    msg: &ConsumerMessage,
) -> Result<(), NotifyError> {
    // 1. 反序列化信封；畸形消息转投死信队列后视为已处理
    let envelope: ReservationEnvelope = match msg.deserialize_payload() {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "通知消息解码失败，转投死信队列"
            );
            if let Err(dlq_err) = dlq.dead_letter(msg).await {
                error!(
                    offset = msg.offset,
                    error = %dlq_err,
                    "死信投递失败，消息可能丢失"
                );
            }
            return Ok(());
        }
    };

    info!(
        email = %envelope.email,
        restaurant = %envelope.restaurant_name,
        "收到预订确认任务"
    );

    // 2. 尽力注册收件人：已注册是幂等命中，其他失败记录后继续。
    //    注册传播与第 3 步的发布之间存在竞态，刚注册的收件人可能
    //    错过本条确认，这是渠道模型接受的限制。
    match channel.subscribe(&envelope.email).await {
        Ok(SubscribeOutcome::Created) => {
            info!(email = %envelope.email, "收件人已注册到确认渠道");
        }
        Ok(SubscribeOutcome::AlreadySubscribed) => {
            debug!(email = %envelope.email, "收件人已在确认渠道注册");
        }
        Err(e) => {
            warn!(
                email = %envelope.email,
                error = %e,
                "注册确认渠道失败，继续发送确认"
            );
        }
    }

    // 3. 组装并面向全渠道发布确认；发布失败是请求级致命错误
    let confirmation = confirmation::compose(&envelope);

    let receipt = channel
        .publish(&confirmation.subject, &confirmation.body)
        .await
        .map_err(|e| NotifyError::ConfirmationRejected {
            reason: e.to_string(),
        })?;

    info!(
        email = %envelope.email,
        message_id = %receipt.message_id,
        "预订确认已发布"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PublishReceipt;
    use async_trait::async_trait;
    use reservation_shared::error::ReservationError;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// 记录型渠道替身：记录发布内容，可注入注册/发布失败
    struct RecordingChannel {
        registered: Mutex<HashSet<String>>,
        published: Mutex<Vec<(String, String)>>,
        fail_subscribe: bool,
        fail_publish: bool,
    }

    impl RecordingChannel {
        fn new() -> Self {
            Self {
                registered: Mutex::new(HashSet::new()),
                published: Mutex::new(Vec::new()),
                fail_subscribe: false,
                fail_publish: false,
            }
        }

        fn with_registered(email: &str) -> Self {
            let channel = Self::new();
            channel.registered.lock().unwrap().insert(email.to_string());
            channel
        }

        fn failing_subscribe() -> Self {
            Self {
                fail_subscribe: true,
                ..Self::new()
            }
        }

        fn failing_publish() -> Self {
            Self {
                fail_publish: true,
                ..Self::new()
            }
        }

        fn published(&self) -> Vec<(String, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConfirmationChannel for RecordingChannel {
        async fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, ReservationError> {
            if self.fail_subscribe {
                return Err(ReservationError::Channel("provider 注册接口 500".to_string()));
            }
            if self.registered.lock().unwrap().insert(email.to_string()) {
                Ok(SubscribeOutcome::Created)
            } else {
                Ok(SubscribeOutcome::AlreadySubscribed)
            }
        }

        async fn publish(
            &self,
            subject: &str,
            body: &str,
        ) -> Result<PublishReceipt, ReservationError> {
            if self.fail_publish {
                return Err(ReservationError::Channel("provider 发布接口 503".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            Ok(PublishReceipt {
                message_id: "msg-test-001".to_string(),
            })
        }
    }

    /// 记录型死信替身
    struct RecordingDlq {
        messages: Mutex<Vec<ConsumerMessage>>,
    }

    impl RecordingDlq {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<ConsumerMessage> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeadLetterSink for RecordingDlq {
        async fn dead_letter(&self, msg: &ConsumerMessage) -> Result<(), ReservationError> {
            self.messages.lock().unwrap().push(msg.clone());
            Ok(())
        }
    }

    fn make_envelope() -> ReservationEnvelope {
        ReservationEnvelope::new("Ann", "ann@x.com", 2, "7:00 PM", "Cafe Nord")
    }

    fn envelope_message(envelope: &ReservationEnvelope) -> ConsumerMessage {
        ConsumerMessage {
            topic: topics::RESERVATION_NOTIFY.to_string(),
            partition: 0,
            offset: 1,
            key: Some(envelope.email.clone()),
            payload: serde_json::to_vec(envelope).unwrap(),
            timestamp: None,
            headers: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_batch_is_success() {
        // 空批次返回成功（"没有待处理消息"），不是错误
        let channel = RecordingChannel::new();
        let dlq = RecordingDlq::new();

        let result = handle_batch(&channel, &dlq, &[]).await;

        assert!(result.is_ok());
        assert!(channel.published().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_published_with_key_fields() {
        let channel = RecordingChannel::new();
        let dlq = RecordingDlq::new();
        let msg = envelope_message(&make_envelope());

        handle_message(&channel, &dlq, &msg).await.unwrap();

        let published = channel.published();
        assert_eq!(published.len(), 1);
        let (subject, body) = &published[0];
        assert_eq!(subject, "预订确认");
        assert!(body.contains("Ann"));
        assert!(body.contains("Cafe Nord"));
        assert!(body.contains("7:00 PM"));
        assert!(body.contains('2'));
    }

    #[tokio::test]
    async fn test_already_subscribed_does_not_block_publish() {
        // 收件人已注册时，注册步骤为幂等命中，确认照常发布
        let channel = RecordingChannel::with_registered("ann@x.com");
        let dlq = RecordingDlq::new();
        let msg = envelope_message(&make_envelope());

        let result = handle_message(&channel, &dlq, &msg).await;

        assert!(result.is_ok());
        assert_eq!(channel.published().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_swallowed_publish_proceeds() {
        // 注册是尽力而为：提供方注册接口故障不阻塞确认发送
        let channel = RecordingChannel::failing_subscribe();
        let dlq = RecordingDlq::new();
        let msg = envelope_message(&make_envelope());

        let result = handle_message(&channel, &dlq, &msg).await;

        assert!(result.is_ok());
        assert_eq!(channel.published().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_fatal() {
        // 确认发布失败必须上抛，使消息保持未提交等待重投
        let channel = RecordingChannel::failing_publish();
        let dlq = RecordingDlq::new();
        let msg = envelope_message(&make_envelope());

        let err = handle_message(&channel, &dlq, &msg)
            .await
            .err()
            .expect("发布失败必须上抛");

        assert!(matches!(err, NotifyError::ConfirmationRejected { .. }));
        assert!(dlq.messages().is_empty(), "发布失败不走死信，等待重投");
    }

    #[tokio::test]
    async fn test_malformed_message_dead_lettered() {
        let channel = RecordingChannel::new();
        let dlq = RecordingDlq::new();
        let msg = ConsumerMessage {
            topic: topics::RESERVATION_NOTIFY.to_string(),
            partition: 0,
            offset: 7,
            key: None,
            payload: b"not json".to_vec(),
            timestamp: None,
            headers: HashMap::new(),
        };

        let result = handle_message(&channel, &dlq, &msg).await;

        // 畸形消息不算处理失败：转投死信后批次可以提交
        assert!(result.is_ok());
        assert!(channel.published().is_empty());
        assert_eq!(dlq.messages().len(), 1);
        assert_eq!(dlq.messages()[0].payload, b"not json");
    }

    #[tokio::test]
    async fn test_batch_processes_entries_in_order() {
        let channel = RecordingChannel::new();
        let dlq = RecordingDlq::new();

        let first = ReservationEnvelope::new("Ann", "ann@x.com", 2, "7:00 PM", "Cafe Nord");
        let second = ReservationEnvelope::new("Bob", "bob@x.com", 4, "8:30 PM", "Trattoria Sud");
        let batch = vec![envelope_message(&first), envelope_message(&second)];

        handle_batch(&channel, &dlq, &batch).await.unwrap();

        let published = channel.published();
        assert_eq!(published.len(), 2);
        assert!(published[0].1.contains("Ann"));
        assert!(published[1].1.contains("Bob"));
    }
}
