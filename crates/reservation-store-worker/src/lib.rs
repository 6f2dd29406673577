//! 预订存储工作者服务
//!
//! 按批消费存储队列中的预订信封，为每个条目独立生成记录标识并写入
//! PostgreSQL。批内条目互不影响：单条解码失败进入死信队列，
//! 单条写库失败使整批保持未提交以便重投。

pub mod consumer;
pub mod error;
pub mod store;
