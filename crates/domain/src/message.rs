use serde::{Deserialize, Serialize};

use crate::value_objects::{Identity, MessageId, RoomId, Timestamp};

/// 聊天消息。创建后不可变：核心从不修改也从不删除消息。
///
/// ID 和时间戳由外部存储在持久化时分配，存储是两者的权威来源。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender: Identity,
    pub content: String,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender: Identity,
        content: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender,
            content: content.into(),
            created_at,
        }
    }
}
