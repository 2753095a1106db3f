//! 连接注册表
//!
//! 跟踪每一条活跃的客户端连接：连接句柄、绑定的身份、
//! 已加入的房间集合，以及通往该连接的出站事件通道。
//!
//! 注册表独占 Connection -> Identity 绑定的所有权。所有方法都是
//! 同步且不挂起的：投递用有界 `try_send`，慢连接只会丢掉自己的
//! 事件，不会拖住其他连接的扇出。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use domain::{ChatError, ChatResult, ConnectionId, Identity, RoomId, ServerEvent};

/// 单条活跃连接的注册表侧状态。
pub struct Connection {
    id: ConnectionId,
    /// 认证成功前为 None；绑定一次后不可更换
    identity: Mutex<Option<Identity>>,
    /// 当前加入的房间，断开清理时使用
    rooms: Mutex<HashSet<RoomId>>,
    outbound: mpsc::Sender<ServerEvent>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().expect("identity lock poisoned").clone()
    }

    /// 绑定身份。同一身份重复绑定是幂等的；
    /// 不同身份的第二次绑定被拒绝，保留原有绑定。
    fn bind(&self, identity: Identity) -> ChatResult<()> {
        let mut bound = self.identity.lock().expect("identity lock poisoned");
        match bound.as_ref() {
            None => {
                *bound = Some(identity);
                Ok(())
            }
            Some(existing) if *existing == identity => Ok(()),
            Some(_) => Err(ChatError::AlreadyBound),
        }
    }

    pub(crate) fn track_room(&self, room_id: RoomId) {
        self.rooms.lock().expect("rooms lock poisoned").insert(room_id);
    }

    pub(crate) fn untrack_room(&self, room_id: &RoomId) {
        self.rooms.lock().expect("rooms lock poisoned").remove(room_id);
    }

    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.rooms
            .lock()
            .expect("rooms lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// 非阻塞投递一个出站事件。
    ///
    /// 背压策略（显式约定）：每连接的出站队列有界，队列满时丢弃
    /// 这条新事件并记录警告——只影响这一条慢连接。在线快照在下次
    /// 变更时自愈，错过的消息走历史补拉。连接已关闭时静默跳过，
    /// 因为对端已经不在了。
    pub fn deliver(&self, event: ServerEvent) {
        use mpsc::error::TrySendError;

        match self.outbound.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    "outbound queue full, dropping event for slow connection"
                );
            }
            Err(TrySendError::Closed(_)) => {
                // 与断开竞争的在途投递：静默跳过
            }
        }
    }
}

/// 连接注册表。
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// 每连接出站队列容量
    outbound_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            outbound_capacity,
        }
    }

    /// 传输层连上时调用，创建一条未绑定身份的连接。没有失败模式。
    ///
    /// 返回连接句柄和它的出站事件接收端，接收端由网关的发送任务消费。
    pub fn register(&self) -> (Arc<Connection>, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let connection = Arc::new(Connection {
            id: ConnectionId::generate(),
            identity: Mutex::new(None),
            rooms: Mutex::new(HashSet::new()),
            outbound: tx,
        });

        self.connections
            .write()
            .expect("connections lock poisoned")
            .insert(connection.id, connection.clone());

        tracing::debug!(connection_id = %connection.id, "connection registered");
        (connection, rx)
    }

    /// 为连接绑定身份。对同一句柄换身份重复绑定返回 `AlreadyBound`。
    pub fn bind_identity(&self, handle: ConnectionId, identity: Identity) -> ChatResult<()> {
        let connection = self.get(handle).ok_or(ChatError::Unauthorized)?;
        connection.bind(identity)
    }

    pub fn get(&self, handle: ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .get(&handle)
            .cloned()
    }

    /// 摘除连接。幂等：重复调用返回空的房间列表。
    ///
    /// 返回断开时仍加入着的房间，网关据此通过房间目录逐一退出。
    pub fn unregister(&self, handle: ConnectionId) -> Vec<RoomId> {
        let removed = self
            .connections
            .write()
            .expect("connections lock poisoned")
            .remove(&handle);

        match removed {
            Some(connection) => {
                tracing::debug!(connection_id = %handle, "connection unregistered");
                connection.joined_rooms()
            }
            None => Vec::new(),
        }
    }

    /// 某身份当前打开的全部连接（多端登录）。
    pub fn connections_for(&self, identity: &Identity) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .values()
            .filter(|conn| conn.identity().as_ref() == Some(identity))
            .cloned()
            .collect()
    }

    /// 按句柄投递事件。句柄已不存在时静默丢弃（客户端已经走了）。
    pub fn deliver(&self, handle: ConnectionId, event: ServerEvent) {
        if let Some(connection) = self.get(handle) {
            connection.deliver(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_creates_unbound_connection() {
        let registry = ConnectionRegistry::new(16);
        let (conn, _rx) = registry.register();

        assert!(conn.identity().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn bind_identity_rejects_a_different_identity() {
        let registry = ConnectionRegistry::new(16);
        let (conn, _rx) = registry.register();

        registry
            .bind_identity(conn.id(), Identity::from("alice"))
            .unwrap();
        // 同一身份重复绑定是幂等的
        registry
            .bind_identity(conn.id(), Identity::from("alice"))
            .unwrap();
        // 换身份被拒绝，保留原有绑定
        let err = registry
            .bind_identity(conn.id(), Identity::from("mallory"))
            .unwrap_err();
        assert_eq!(err, ChatError::AlreadyBound);
        assert_eq!(conn.identity(), Some(Identity::from("alice")));
    }

    #[tokio::test]
    async fn unregister_is_idempotent_and_returns_joined_rooms() {
        let registry = ConnectionRegistry::new(16);
        let (conn, _rx) = registry.register();
        conn.track_room(RoomId::from("r1"));
        conn.track_room(RoomId::from("r2"));

        let mut rooms = registry.unregister(conn.id());
        rooms.sort();
        assert_eq!(rooms, vec![RoomId::from("r1"), RoomId::from("r2")]);
        assert!(registry.unregister(conn.id()).is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn connections_for_finds_all_sessions_of_one_identity() {
        let registry = ConnectionRegistry::new(16);
        let (a1, _rx1) = registry.register();
        let (a2, _rx2) = registry.register();
        let (b, _rx3) = registry.register();

        registry
            .bind_identity(a1.id(), Identity::from("alice"))
            .unwrap();
        registry
            .bind_identity(a2.id(), Identity::from("alice"))
            .unwrap();
        registry.bind_identity(b.id(), Identity::from("bob")).unwrap();

        assert_eq!(registry.connections_for(&Identity::from("alice")).len(), 2);
        assert_eq!(registry.connections_for(&Identity::from("bob")).len(), 1);
    }

    #[tokio::test]
    async fn deliver_to_removed_handle_is_silently_dropped() {
        let registry = ConnectionRegistry::new(16);
        let (conn, rx) = registry.register();
        let handle = conn.id();
        drop(rx);
        registry.unregister(handle);

        // 不得 panic，也不得报错
        registry.deliver(handle, ServerEvent::presence(RoomId::from("r"), vec![]));
    }

    #[tokio::test]
    async fn full_outbound_queue_drops_only_the_new_event() {
        let registry = ConnectionRegistry::new(1);
        let (conn, mut rx) = registry.register();

        let first = ServerEvent::presence(RoomId::from("r"), vec![Identity::from("a")]);
        let second = ServerEvent::presence(RoomId::from("r"), vec![]);
        conn.deliver(first.clone());
        conn.deliver(second); // 队列已满，被丢弃

        assert_eq!(rx.recv().await, Some(first));
        assert!(rx.try_recv().is_err());
    }
}
