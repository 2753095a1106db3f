//! 基础设施层实现。
//!
//! 提供外部存储接口的进程内适配器：内存账号/令牌/房间/消息存储，
//! 以及 bcrypt 密码哈希。

pub mod memory_store;
pub mod password;

pub use memory_store::{MemoryStore, ProvisionError};
pub use password::BcryptPasswordHasher;
