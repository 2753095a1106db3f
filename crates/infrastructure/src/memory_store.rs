//! 内存存储适配器
//!
//! 账号、会话令牌、房间权威成员列表和消息历史的进程内实现，
//! 提供领域层定义的 UserStore / RoomStore / MessageStore 接口。
//! 核心假定单个权威进程拥有全部状态，重启后不保留——
//! 生产部署可以换成数据库实现而不触碰核心。

use std::collections::{HashMap, HashSet};

use rand::RngCore;
use thiserror::Error;
use tokio::sync::RwLock;

use async_trait::async_trait;
use domain::{
    ChatError, Identity, Message, MessageId, MessageStore, RoomDescriptor, RoomId, RoomKind,
    RoomStore, SessionToken, UserStore,
};

use crate::password::BcryptPasswordHasher;

/// 建档（注册/建房）阶段的错误，不属于线上协议的错误分类。
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("user already exists: {username}")]
    UserExists { username: String },
    #[error("room already exists: {room_id}")]
    RoomExists { room_id: String },
    #[error("hashing failed: {0}")]
    Hash(ChatError),
}

struct UserRecord {
    identity: Identity,
    password_hash: String,
}

struct RoomRecord {
    descriptor: RoomDescriptor,
    /// 权威成员列表，只对 Direct/Group 有意义；频道对所有人开放
    members: HashSet<Identity>,
}

/// 每个房间的消息日志：单调递增的序列号 + 按持久化顺序的消息。
#[derive(Default)]
struct MessageLog {
    next_sequence: u64,
    entries: Vec<Message>,
}

pub struct MemoryStore {
    users: RwLock<HashMap<String, UserRecord>>,
    tokens: RwLock<HashMap<String, Identity>>,
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    messages: RwLock<HashMap<RoomId, MessageLog>>,
    hasher: BcryptPasswordHasher,
}

impl MemoryStore {
    pub fn new(bcrypt_cost: Option<u32>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            hasher: BcryptPasswordHasher::new(bcrypt_cost),
        }
    }

    /// 注册一个账号。身份标识就是用户名（对核心来说是不透明字符串）。
    pub async fn register_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, ProvisionError> {
        let hash = self
            .hasher
            .hash(password)
            .await
            .map_err(ProvisionError::Hash)?;

        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(ProvisionError::UserExists {
                username: username.to_owned(),
            });
        }

        let identity = Identity::from(username);
        users.insert(
            username.to_owned(),
            UserRecord {
                identity: identity.clone(),
                password_hash: hash,
            },
        );
        tracing::info!(username, "user registered");
        Ok(identity)
    }

    /// 建一个房间。频道的成员列表为空（对所有人开放）；
    /// 私聊和群聊要求调用方给出显式成员。
    pub async fn create_room(
        &self,
        descriptor: RoomDescriptor,
        members: Vec<Identity>,
    ) -> Result<(), ProvisionError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&descriptor.id) {
            return Err(ProvisionError::RoomExists {
                room_id: descriptor.id.to_string(),
            });
        }
        tracing::info!(room_id = %descriptor.id, kind = ?descriptor.kind, "room created");
        rooms.insert(
            descriptor.id.clone(),
            RoomRecord {
                descriptor,
                members: members.into_iter().collect(),
            },
        );
        Ok(())
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        data_encoding::BASE64URL_NOPAD.encode(&bytes)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, ChatError> {
        let hash = {
            let users = self.users.read().await;
            match users.get(username) {
                Some(record) => record.password_hash.clone(),
                None => return Err(ChatError::InvalidCredentials),
            }
        };

        if self.hasher.verify(password, &hash).await? {
            let users = self.users.read().await;
            Ok(users
                .get(username)
                .map(|record| record.identity.clone())
                .ok_or(ChatError::InvalidCredentials)?)
        } else {
            Err(ChatError::InvalidCredentials)
        }
    }

    async fn issue_token(&self, identity: &Identity) -> Result<SessionToken, ChatError> {
        let token = Self::generate_token();
        self.tokens
            .write()
            .await
            .insert(token.clone(), identity.clone());
        Ok(SessionToken::new(token))
    }

    async fn resolve_token(&self, token: &str) -> Result<Identity, ChatError> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(ChatError::InvalidToken)
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn is_authorized_member(
        &self,
        identity: &Identity,
        room_id: &RoomId,
    ) -> Result<bool, ChatError> {
        let rooms = self.rooms.read().await;
        Ok(match rooms.get(room_id) {
            Some(record) => match record.descriptor.kind {
                RoomKind::Channel => true,
                RoomKind::Direct | RoomKind::Group => record.members.contains(identity),
            },
            // 未登记的房间对谁都不开放
            None => false,
        })
    }

    async fn list_rooms_for(&self, identity: &Identity) -> Result<Vec<RoomDescriptor>, ChatError> {
        let rooms = self.rooms.read().await;
        let mut descriptors: Vec<RoomDescriptor> = rooms
            .values()
            .filter(|record| match record.descriptor.kind {
                RoomKind::Channel => true,
                RoomKind::Direct | RoomKind::Group => record.members.contains(identity),
            })
            .map(|record| record.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(
        &self,
        room_id: &RoomId,
        sender: &Identity,
        content: &str,
    ) -> Result<Message, ChatError> {
        let mut messages = self.messages.write().await;
        let log = messages.entry(room_id.clone()).or_default();

        // 序列号在房间内单调递增，是消息排序的稳定依据
        log.next_sequence += 1;
        let message = Message::new(
            MessageId::new(log.next_sequence),
            room_id.clone(),
            sender.clone(),
            content,
            chrono::Utc::now(),
        );
        log.entries.push(message.clone());
        Ok(message)
    }

    async fn read_messages(&self, room_id: &RoomId) -> Result<Vec<Message>, ChatError> {
        let messages = self.messages.read().await;
        Ok(messages
            .get(room_id)
            .map(|log| log.entries.clone())
            .unwrap_or_default())
    }
}
