//! 实时协调核心
//!
//! 连接注册表、房间目录、消息中继、在线状态通知器。
//! 这里是整个系统唯一有真正并发与一致性问题的地方：任意多条
//! 连接并发地变更共享的房间成员与消息流状态，同一房间内的
//! 事件必须被所有成员按同一顺序观察到。
//!
//! 这些结构在进程启动时显式构造一次、以 Arc 传入会话网关，
//! 不存在任何隐式全局状态。

pub mod presence;
pub mod registry;
pub mod relay;
pub mod rooms;

pub use presence::PresenceNotifier;
pub use registry::{Connection, ConnectionRegistry};
pub use relay::MessageRelay;
pub use rooms::RoomDirectory;
