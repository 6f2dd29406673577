//! 网关路由定义

use axum::{Router, routing::post};

use crate::{handlers, state::AppState};

/// 预订接入 API 路由
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/api/reservations", post(handlers::create_reservation))
}
