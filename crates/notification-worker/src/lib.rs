//! 预订通知工作者服务
//!
//! 消费通知队列中的预订信封，尽力将收件人注册到确认渠道后，
//! 面向整个渠道发布人类可读的预订确认。注册失败不阻塞确认发送；
//! 确认发布失败使消息保持未提交，由队列重投。

pub mod channel;
pub mod confirmation;
pub mod consumer;
pub mod error;
