//! 日志初始化模块
//!
//! 基于 tracing-subscriber 提供统一的结构化日志初始化，
//! 日志级别与输出格式由配置决定。

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 初始化全局日志订阅器
///
/// 环境变量 RUST_LOG 优先于配置中的 log_level；
/// log_format 为 "json" 时输出结构化日志（面向日志采集），
/// 其他取值输出带颜色的人类可读格式（面向本地开发）。
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    info!(
        service = service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "日志已初始化"
    );

    Ok(())
}
