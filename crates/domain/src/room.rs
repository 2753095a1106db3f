use serde::{Deserialize, Serialize};

use crate::value_objects::RoomId;

/// 房间类型，决定授权规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    /// 公开频道，任何已认证用户都可以加入
    Channel,
    /// 两人私聊，只有双方可以加入
    Direct,
    /// 群聊，只有显式成员可以加入
    Group,
}

/// 房间的描述信息，来自外部存储的权威成员列表。
///
/// 注意这与在线成员（presence）是两回事：描述信息记录谁*有权*进入，
/// 房间目录记录谁*当前在线*。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    pub id: RoomId,
    pub name: String,
    pub kind: RoomKind,
}

impl RoomDescriptor {
    pub fn new(id: RoomId, name: impl Into<String>, kind: RoomKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}
