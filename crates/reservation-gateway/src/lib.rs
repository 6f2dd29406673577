//! 预订接入网关
//!
//! 接收预订 HTTP 请求，校验后将信封并发发布到存储与通知两条队列。
//! 两路发布合并为一个逻辑单元：任一路失败即向调用方报错，
//! 已成功的一路不回滚（队列无法撤回消息）。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod publisher;
pub mod routes;
pub mod state;
