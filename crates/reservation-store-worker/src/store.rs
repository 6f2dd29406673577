//! 预订记录存储
//!
//! 通过 `ReservationStore` trait 抽象写入行为：生产环境由
//! `PgReservationStore` 落库，测试中用记录型替身验证批处理语义。
//! 写入形状同时是查询服务的读取契约：按 email 检索、按写入时间排序。

use async_trait::async_trait;
use reservation_shared::envelope::ReservationRecord;
use reservation_shared::error::ReservationError;
use sqlx::PgPool;
use tracing::debug;

/// 预订记录写入抽象
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// 写入一条记录；每条记录对应一次独立的 INSERT，无更新路径
    async fn insert(&self, record: &ReservationRecord) -> Result<(), ReservationError>;
}

/// PostgreSQL 实现
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 按 email 查询记录，按写入时间倒序
    ///
    /// 这是查询服务（外部协作方，不在本仓库实现）依赖的读取形状：
    /// 空结果返回空 Vec，与查询失败（Err）可区分。
    pub async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<ReservationRecord>, ReservationError> {
        let records = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, email, name, quantity, reservation_time, restaurant_name, created_at
            FROM reservations
            WHERE email = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn insert(&self, record: &ReservationRecord) -> Result<(), ReservationError> {
        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, email, name, quantity, reservation_time, restaurant_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.id)
        .bind(&record.email)
        .bind(&record.name)
        .bind(record.quantity)
        .bind(&record.reservation_time)
        .bind(&record.restaurant_name)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        debug!(record_id = %record.id, email = %record.email, "预订记录已写入");
        Ok(())
    }
}
