//! 预订存储工作者
//!
//! 消费存储队列中的预订信封，逐条生成记录标识并写入 PostgreSQL。

use std::sync::Arc;

use reservation_shared::{
    config::AppConfig, database::Database, kafka::KafkaProducer, observability,
};
use reservation_store_worker::{consumer::StoreConsumer, store::PgReservationStore};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("reservation-store-worker").unwrap_or_default();
    observability::init(&config.service_name, &config.observability)?;

    info!("Starting reservation-store-worker...");

    // 初始化基础设施：数据库连接池 + 建表迁移
    let db = Database::connect(&config.database).await?;
    db.run_migrations().await?;

    let store = Arc::new(PgReservationStore::new(db.pool().clone()));
    // 生产者仅用于死信投递
    let producer = KafkaProducer::new(&config.kafka)?;

    let consumer = StoreConsumer::new(&config, store, producer)?;

    // 通过 watch channel 将关闭信号传递给消费循环
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(consumer.run(shutdown_rx));

    shutdown_signal().await;
    shutdown_tx.send(true)?;

    worker.await??;
    db.close().await;

    info!("reservation-store-worker shutdown complete");
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
