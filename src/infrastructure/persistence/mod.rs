//! 持久化层
//!
//! - sqlite: 后端记录存储（同步确认的权威副本）
//! - sled: 本地章节快照（write-ahead 一侧）

pub mod sled;
pub mod sqlite;
