//! 领域模型
//!
//! 值对象、消息实体、线上协议事件、错误分类，以及核心依赖的
//! 外部存储接口。不包含任何并发状态。

pub mod errors;
pub mod events;
pub mod message;
pub mod repository;
pub mod room;
pub mod value_objects;

pub use errors::{ChatError, ChatResult, StoreError};
pub use events::{ClientEvent, ServerEvent};
pub use message::Message;
pub use repository::{MessageStore, RoomStore, UserStore};
pub use room::{RoomDescriptor, RoomKind};
pub use value_objects::{
    ConnectionId, Identity, MessageContent, MessageId, RoomId, SessionToken, Timestamp,
};
