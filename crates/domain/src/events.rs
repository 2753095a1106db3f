//! 线上协议事件定义
//!
//! 客户端与服务端在一条持久双工连接上交换的全部事件。
//! JSON 编码，`type` 字段区分事件种类。

use serde::{Deserialize, Serialize};

use crate::errors::ChatError;
use crate::message::Message;
use crate::value_objects::{Identity, RoomId, Timestamp};

/// 客户端发来的入站事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEvent {
    /// 认证，绑定身份到当前连接
    Auth { token: String },
    /// 加入房间
    #[serde(rename_all = "camelCase")]
    Join { room_id: RoomId },
    /// 离开房间
    #[serde(rename_all = "camelCase")]
    Leave { room_id: RoomId },
    /// 向房间发送消息
    #[serde(rename_all = "camelCase")]
    Send { room_id: RoomId, content: String },
}

/// 服务端推送给客户端的出站事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// 消息扇出推送
    #[serde(rename_all = "camelCase")]
    Message {
        id: u64,
        room_id: RoomId,
        sender_identity: Identity,
        content: String,
        created_at: Timestamp,
    },
    /// 在线成员全量快照（不是增量）
    #[serde(rename_all = "camelCase")]
    Presence {
        room_id: RoomId,
        identities: Vec<Identity>,
    },
    /// 非致命错误，连接保持打开
    Error { code: String, detail: String },
}

impl ServerEvent {
    pub fn message(message: &Message) -> Self {
        Self::Message {
            id: message.id.value(),
            room_id: message.room_id.clone(),
            sender_identity: message.sender.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }

    pub fn presence(room_id: RoomId, identities: Vec<Identity>) -> Self {
        Self::Presence {
            room_id,
            identities,
        }
    }

    pub fn error(err: &ChatError) -> Self {
        Self::Error {
            code: err.code().to_owned(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_the_wire_field_names() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"send","roomId":"general","content":"hi"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Send {
                room_id: RoomId::from("general"),
                content: "hi".to_owned(),
            }
        );

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"auth","token":"abc"}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Auth {
                token: "abc".to_owned()
            }
        );
    }

    #[test]
    fn presence_event_serializes_full_snapshot() {
        let event = ServerEvent::presence(
            RoomId::from("general"),
            vec![Identity::from("alice"), Identity::from("bob")],
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "presence");
        assert_eq!(json["roomId"], "general");
        assert_eq!(json["identities"][0], "alice");
        assert_eq!(json["identities"][1], "bob");
    }

    #[test]
    fn error_event_carries_code_and_detail() {
        let event = ServerEvent::error(&ChatError::Unauthorized);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "Unauthorized");
    }
}
