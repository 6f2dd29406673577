//! 预订接入 API 处理器

use axum::{Json, extract::State};
use reservation_shared::envelope::ReservationEnvelope;
use tracing::info;
use validator::Validate;

use crate::{
    dto::{CreateReservationRequest, MessageResponse},
    error::GatewayError,
    publisher::fan_out,
    state::AppState,
};

/// 创建预订
///
/// POST /api/reservations
///
/// 校验失败立即返回 400，不触发任何发布（校验阶段无副作用）；
/// 校验通过后构造信封并扇出到两条队列，任一路失败返回 500。
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<MessageResponse>, GatewayError> {
    req.validate()?;

    let envelope: ReservationEnvelope = req.into();

    fan_out(state.publisher.as_ref(), &envelope).await?;

    info!(
        email = %envelope.email,
        restaurant = %envelope.restaurant_name,
        quantity = envelope.quantity,
        "预订已发布到存储与通知队列"
    );

    Ok(Json(MessageResponse {
        message: "预订已提交，存储与通知队列均已接收".to_string(),
    }))
}
