//! 预订接入网关服务
//!
//! 提供预订创建 REST API，将校验后的信封扇出到两条 Kafka 队列。

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use reservation_gateway::{routes, state::AppState};
use reservation_shared::{config::AppConfig, kafka::KafkaProducer, observability};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：从 config/{service_name}.toml 加载
    let config = AppConfig::load("reservation-gateway").unwrap_or_default();
    observability::init(&config.service_name, &config.observability)?;

    info!("Starting reservation-gateway on {}", config.server_addr());

    // 网关唯一的基础设施依赖是 Kafka 生产者
    let producer = KafkaProducer::new(&config.kafka)?;
    let state = AppState::new(Arc::new(producer));

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", get(health_check))
        // 请求级访问日志
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM（K8s 停止 Pod）或 Ctrl+C 时，
    // 停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 收到任一信号后返回，触发 axum 的优雅关闭流程。
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

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "reservation-gateway"
    }))
}
