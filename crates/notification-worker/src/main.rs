//! 预订通知工作者
//!
//! 消费通知队列中的预订信封，注册收件人并发布预订确认。

use std::sync::Arc;

use notification_worker::{channel::EmailTopicChannel, consumer::NotifyConsumer};
use reservation_shared::{config::AppConfig, kafka::KafkaProducer, observability};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notification-worker").unwrap_or_default();
    observability::init(&config.service_name, &config.observability)?;

    info!("Starting notification-worker...");

    let channel = Arc::new(EmailTopicChannel::new());
    // 生产者仅用于死信投递
    let producer = KafkaProducer::new(&config.kafka)?;

    let consumer = NotifyConsumer::new(&config, channel, producer)?;

    // 通过 watch channel 将关闭信号传递给消费循环
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(consumer.run(shutdown_rx));

    shutdown_signal().await;
    shutdown_tx.send(true)?;

    worker.await??;

    info!("notification-worker shutdown complete");
    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
