//! 信封发布与双队列扇出
//!
//! 通过 `EnvelopePublisher` trait 抽象队列发布行为：生产环境由
//! `KafkaProducer` 实现，测试中用记录型替身验证扇出语义而无需 broker。

use async_trait::async_trait;
use reservation_shared::envelope::ReservationEnvelope;
use reservation_shared::error::ReservationError;
use reservation_shared::kafka::{KafkaProducer, topics};
use tracing::{debug, warn};

use crate::error::GatewayError;

/// 信封发布器 trait
///
/// 单次、一发即弃的发布操作：不在本地重试，失败直接上抛，
/// 由调用方决定向客户端报错。
#[async_trait]
pub trait EnvelopePublisher: Send + Sync {
    /// 将信封以 JSON 负载发布到指定 topic
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        envelope: &ReservationEnvelope,
    ) -> Result<(), ReservationError>;
}

#[async_trait]
impl EnvelopePublisher for KafkaProducer {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        envelope: &ReservationEnvelope,
    ) -> Result<(), ReservationError> {
        // 在发布边界把底层 Kafka 错误归类为发布错误，保留失败的队列名
        self.send_json(topic, key, envelope)
            .await
            .map(|_| ())
            .map_err(|e| ReservationError::Publish {
                queue: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

/// 将一个信封扇出到存储与通知两条队列
///
/// 两路发布并发执行并全部等待（rendezvous），都成功才算成功。
/// 任一路失败时不回滚已成功的一路——队列没有"撤回"操作，调用方收到
/// 失败响应时，另一条队列可能仍持有该消息并被其消费者正常处理。
/// 两条队列之间的发布完成顺序不作任何保证。
pub async fn fan_out(
    publisher: &dyn EnvelopePublisher,
    envelope: &ReservationEnvelope,
) -> Result<(), GatewayError> {
    let key = envelope.email.as_str();

    let (store_result, notify_result) = tokio::join!(
        publisher.publish(topics::RESERVATION_STORE, key, envelope),
        publisher.publish(topics::RESERVATION_NOTIFY, key, envelope),
    );

    let mut failures = Vec::new();
    for (queue, result) in [
        (topics::RESERVATION_STORE, &store_result),
        (topics::RESERVATION_NOTIFY, &notify_result),
    ] {
        match result {
            Ok(()) => debug!(queue, email = %envelope.email, "队列发布成功"),
            Err(e) => {
                warn!(queue, email = %envelope.email, error = %e, "队列发布失败");
                failures.push(format!("{queue}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::Publish(failures.join("; ")))
    }
}
