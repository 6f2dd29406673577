//! 存储队列消费与批处理
//!
//! 将 Kafka 消息批次解码为预订信封并逐条落库。条目之间完全独立：
//! 解码失败的条目转投死信队列后视为已处理；写库失败的条目使整批
//! 保持未提交，由队列基础设施重投（Kafka 只能按偏移提交，无法单条
//! 确认，重投因此是整批粒度——已写入的条目会再次写入并获得新 id，
//! 这与管道无去重键的设计一致）。

use std::sync::Arc;

use reservation_shared::config::AppConfig;
use reservation_shared::envelope::{ReservationEnvelope, ReservationRecord};
use reservation_shared::kafka::{
    ConsumerMessage, DeadLetterSink, KafkaConsumer, KafkaProducer, topics,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::StoreWorkerError;
use crate::store::ReservationStore;

/// 批处理结果
///
/// 逐条目跟踪处置方式，消费循环据此决定是否提交偏移。
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// 成功写入的记录 id
    pub stored: Vec<String>,
    /// 解码失败并已转投死信队列的条目数
    pub dead_lettered: usize,
    /// 写库失败的条目数，非零时整批不提交
    pub write_failed: usize,
}

impl BatchOutcome {
    /// 批内所有条目是否都已妥善处置（写入或死信）
    pub fn fully_disposed(&self) -> bool {
        self.write_failed == 0
    }
}

/// 存储消费者
///
/// 组合 KafkaConsumer（按批拉取）、ReservationStore（落库）
/// 和 KafkaProducer（死信投递）三个组件，形成完整的持久化管道。
pub struct StoreConsumer {
    consumer: KafkaConsumer,
    store: Arc<dyn ReservationStore>,
    producer: KafkaProducer,
    config: AppConfig,
}

impl StoreConsumer {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn ReservationStore>,
        producer: KafkaProducer,
    ) -> Result<Self, StoreWorkerError> {
        let consumer = KafkaConsumer::new(&config.kafka, Some("store"))?;
        Ok(Self {
            consumer,
            store,
            producer,
            config: config.clone(),
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), StoreWorkerError> {
        self.consumer.subscribe(&[topics::RESERVATION_STORE])?;

        info!(
            topic = topics::RESERVATION_STORE,
            batch_size = self.config.consumer.batch_size,
            "存储消费者已启动"
        );

        let store = self.store;
        let producer = self.producer;
        let batching = self.config.consumer.clone();

        self.consumer
            .start_batches(batching, shutdown, |batch| {
                let store = &store;
                let producer = &producer;
                async move {
                    let total = batch.len();
                    let outcome = handle_batch(store.as_ref(), producer, &batch).await;

                    info!(
                        total,
                        stored = outcome.stored.len(),
                        dead_lettered = outcome.dead_lettered,
                        write_failed = outcome.write_failed,
                        "批次处理完成"
                    );

                    if outcome.fully_disposed() {
                        Ok(())
                    } else {
                        Err(StoreWorkerError::BatchWriteFailed {
                            failed: outcome.write_failed,
                            total,
                        })
                    }
                }
            })
            .await;

        info!("存储消费者已停止");
        Ok(())
    }
}

/// 处理一批存储队列消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
/// 每个条目独立走完"解码 -> 生成 id -> 写入"流程并记录处置结果，
/// 不因单条失败中断兄弟条目。
pub async fn handle_batch(
    store: &dyn ReservationStore,
    dlq: &dyn DeadLetterSink,
    batch: &[ConsumerMessage],
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for msg in batch {
        let envelope: ReservationEnvelope = match msg.deserialize_payload() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "条目解码失败，转投死信队列"
                );
                if let Err(dlq_err) = dlq.dead_letter(msg).await {
                    error!(
                        offset = msg.offset,
                        error = %dlq_err,
                        "死信投递失败，消息可能丢失"
                    );
                }
                outcome.dead_lettered += 1;
                continue;
            }
        };

        // 每次持久化尝试独立生成 id：重复投递产生重复记录而非覆盖
        let record = ReservationRecord::from_envelope(&envelope);

        match store.insert(&record).await {
            Ok(()) => {
                info!(
                    record_id = %record.id,
                    email = %record.email,
                    restaurant = %record.restaurant_name,
                    "预订记录已持久化"
                );
                outcome.stored.push(record.id);
            }
            Err(e) => {
                warn!(
                    email = %envelope.email,
                    error = %e,
                    "预订记录写库失败，批次将被重投"
                );
                outcome.write_failed += 1;
            }
        }
    }

    outcome
}
