//! 房间目录
//!
//! RoomId -> 在线连接集合的唯一权威来源。加入前先问外部存储的
//! 权威成员列表做授权；每次实际的成员变更都在该房间的排序保护下
//! 触发一次 presence 全量广播。
//!
//! 并发纪律（单写者）：每个房间持有自己的 `tokio::sync::Mutex`
//! 排序锁，join/leave/send 对同一房间串行，不同房间完全并行，
//! 不存在全局大锁。成员快照走独立的 `std::sync::RwLock`，
//! 扇出读取不需要拿排序锁。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use domain::{ChatError, ChatResult, ConnectionId, RoomId, RoomStore};

use crate::presence::PresenceNotifier;
use crate::registry::Connection;

/// 单个房间的在线状态。零在线成员的房间仍然存在——
/// 在线成员是临时的 presence 状态，与存储里的权威成员列表无关。
pub(crate) struct RoomState {
    /// 在线连接集合，快照读不需要排序锁
    members: RwLock<HashSet<ConnectionId>>,
    /// 同一房间的成员变更和消息流串行化在这把锁后面
    pub(crate) order: Mutex<()>,
}

impl RoomState {
    fn new() -> Self {
        Self {
            members: RwLock::new(HashSet::new()),
            order: Mutex::new(()),
        }
    }

    pub(crate) fn members_snapshot(&self) -> Vec<ConnectionId> {
        self.members
            .read()
            .expect("members lock poisoned")
            .iter()
            .copied()
            .collect()
    }

    fn insert(&self, handle: ConnectionId) -> bool {
        self.members
            .write()
            .expect("members lock poisoned")
            .insert(handle)
    }

    fn remove(&self, handle: ConnectionId) -> bool {
        self.members
            .write()
            .expect("members lock poisoned")
            .remove(&handle)
    }
}

/// 房间目录。
pub struct RoomDirectory {
    rooms: RwLock<HashMap<RoomId, Arc<RoomState>>>,
    store: Arc<dyn RoomStore>,
    presence: PresenceNotifier,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn RoomStore>, presence: PresenceNotifier) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            store,
            presence,
        }
    }

    /// 把连接加入房间。
    ///
    /// 绑定身份不是房间的授权成员时返回 `Forbidden`，此时不产生任何
    /// presence 广播。幂等：重复加入是无副作用的 no-op；
    /// 已摘除的连接同样是 no-op。
    pub async fn join(&self, room_id: &RoomId, conn: &Arc<Connection>) -> ChatResult<()> {
        let identity = conn.identity().ok_or(ChatError::Unauthorized)?;

        // 授权查询是唯一的挂起点，放在排序锁之外
        let authorized = self.store.is_authorized_member(&identity, room_id).await?;
        if !authorized {
            return Err(ChatError::forbidden(room_id.as_str()));
        }

        let room = self.room_entry(room_id);
        let _order = room.order.lock().await;

        // 已从注册表摘除的连接不再入房：断开清理之后才分发到的
        // 晚到 join 会把死句柄永久留在成员集里
        if !self.presence.is_connected(conn.id()) {
            return Ok(());
        }

        if room.insert(conn.id()) {
            conn.track_room(room_id.clone());
            tracing::info!(room_id = %room_id, identity = %identity, connection_id = %conn.id(), "用户加入房间");
            self.presence.push_snapshot(room_id, &room.members_snapshot());
        }

        Ok(())
    }

    /// 把连接移出房间。幂等：离开未加入的房间是 no-op，不广播。
    pub async fn leave(&self, room_id: &RoomId, conn: &Arc<Connection>) {
        conn.untrack_room(room_id);

        let Some(room) = self.get_room(room_id) else {
            return;
        };
        let _order = room.order.lock().await;

        if room.remove(conn.id()) {
            tracing::info!(room_id = %room_id, connection_id = %conn.id(), "用户离开房间");
            self.presence.push_snapshot(room_id, &room.members_snapshot());
        }
    }

    /// 断开清理：把连接移出它加入的每一个房间。
    ///
    /// 每个房间的退出都走各自的排序锁，所以退房广播与该房间的
    /// 其他事件保持一致顺序。
    pub async fn leave_all(&self, conn: &Arc<Connection>) {
        for room_id in conn.joined_rooms() {
            self.leave(&room_id, conn).await;
        }
    }

    /// 当前在线成员的时点快照（扇出与 presence 计算用）。
    pub fn members_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.get_room(room_id)
            .map(|room| room.members_snapshot())
            .unwrap_or_default()
    }

    /// 连接当前是否加入了该房间。
    pub fn is_member(&self, room_id: &RoomId, handle: ConnectionId) -> bool {
        self.get_room(room_id)
            .map(|room| {
                room.members
                    .read()
                    .expect("members lock poisoned")
                    .contains(&handle)
            })
            .unwrap_or(false)
    }

    pub(crate) fn get_room(&self, room_id: &RoomId) -> Option<Arc<RoomState>> {
        self.rooms
            .read()
            .expect("rooms lock poisoned")
            .get(room_id)
            .cloned()
    }

    /// 取出或创建房间条目。房间一旦出现就不回收：
    /// 零在线成员的房间继续存在。
    fn room_entry(&self, room_id: &RoomId) -> Arc<RoomState> {
        if let Some(room) = self.get_room(room_id) {
            return room;
        }
        let mut rooms = self.rooms.write().expect("rooms lock poisoned");
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| Arc::new(RoomState::new()))
            .clone()
    }
}
