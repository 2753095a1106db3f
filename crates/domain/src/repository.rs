//! 外部存储接口
//!
//! 核心只通过这些 trait 消费持久层：认证、授权成员列表、
//! 消息持久化与历史读取。具体实现（数据库、内存）在 infrastructure。

use async_trait::async_trait;

use crate::errors::ChatError;
use crate::message::Message;
use crate::room::RoomDescriptor;
use crate::value_objects::{Identity, RoomId, SessionToken};

/// 账号与会话存储。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 用户名密码认证，返回身份标识
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, ChatError>;

    /// 为已认证身份签发会话令牌
    async fn issue_token(&self, identity: &Identity) -> Result<SessionToken, ChatError>;

    /// 令牌换取身份（WebSocket 认证路径）
    async fn resolve_token(&self, token: &str) -> Result<Identity, ChatError>;
}

/// 房间权威成员列表存储。
///
/// 这是"谁可以进入"的来源，与房间目录里的在线成员无关。
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// 频道对所有人开放；私聊和群聊要求显式成员资格
    async fn is_authorized_member(
        &self,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<bool, ChatError>;

    /// 列出某身份有权进入的房间
    async fn list_rooms_for(&self, identity: &Identity) -> Result<Vec<RoomDescriptor>, ChatError>;
}

/// 持久化消息历史存储。ID 与时间戳由存储分配。
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 持久化一条消息，分配房间内单调递增的 ID 和时间戳
    async fn append_message(
        &self,
        room_id: &RoomId,
        sender: &Identity,
        content: &str,
    ) -> Result<Message, ChatError>;

    /// 按持久化顺序读取房间历史（重连补拉路径）
    async fn read_messages(&self, room_id: &RoomId) -> Result<Vec<Message>, ChatError>;
}
