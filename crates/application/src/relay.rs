//! 消息中继
//!
//! 接收一个房间的出站消息：校验内容，交给外部存储持久化
//! （存储分配 ID 和时间戳），然后把结果扇出给房间目录里当前
//! 在线的每一条成员连接。
//!
//! 顺序保证：persist + fan-out 整体运行在该房间的排序锁内，
//! 同一房间里先被接受的消息先持久化、且被每个成员按同一顺序
//! 观察到。不同房间之间没有相对顺序。投递是尽力而为的
//! at-most-once：持久化与扇出之间断开的连接错过这次推送，
//! 通过历史补拉恢复。

use std::sync::Arc;

use domain::{
    ChatError, ChatResult, Identity, Message, MessageContent, MessageStore, RoomId, ServerEvent,
};

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomDirectory;

pub struct MessageRelay {
    directory: Arc<RoomDirectory>,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
}

impl MessageRelay {
    pub fn new(
        directory: Arc<RoomDirectory>,
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            directory,
            registry,
            store,
        }
    }

    /// 发送一条消息：校验、持久化、扇出。
    ///
    /// 被拒绝的发送（空内容、房间不存在、存储不可用）不会出现在
    /// 任何成员的消息流里——没有乐观本地回显，持久化失败就是失败。
    pub async fn send(
        &self,
        room_id: &RoomId,
        sender: &Identity,
        content: &str,
    ) -> ChatResult<Message> {
        let content = MessageContent::new(content)?;

        let room = self
            .directory
            .get_room(room_id)
            .ok_or_else(|| ChatError::room_not_found(room_id.as_str()))?;

        // 排序锁跨越持久化和扇出：同一房间内先接受先送达
        let _order = room.order.lock().await;

        let message = self
            .store
            .append_message(room_id, sender, content.as_str())
            .await?;

        tracing::debug!(
            room_id = %room_id,
            message_id = %message.id,
            sender = %sender,
            "message persisted, fanning out"
        );

        let event = ServerEvent::message(&message);
        for handle in room.members_snapshot() {
            // 已断开的句柄由注册表静默跳过
            self.registry.deliver(handle, event.clone());
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use domain::{MessageId, RoomDescriptor, RoomStore, StoreError};

    use super::*;
    use crate::presence::PresenceNotifier;

    struct OpenRoomStore;

    #[async_trait]
    impl RoomStore for OpenRoomStore {
        async fn is_authorized_member(
            &self,
            _identity: &Identity,
            _room_id: &RoomId,
        ) -> Result<bool, ChatError> {
            Ok(true)
        }

        async fn list_rooms_for(
            &self,
            _identity: &Identity,
        ) -> Result<Vec<RoomDescriptor>, ChatError> {
            Ok(vec![])
        }
    }

    /// 内存消息存储：全局递增 ID，可切换为不可用来模拟存储故障。
    struct StubMessageStore {
        next_id: AtomicU64,
        unavailable: bool,
    }

    impl StubMessageStore {
        fn new() -> Self {
            Self {
                next_id: AtomicU64::new(1),
                unavailable: false,
            }
        }

        fn down() -> Self {
            Self {
                next_id: AtomicU64::new(1),
                unavailable: true,
            }
        }
    }

    #[async_trait]
    impl MessageStore for StubMessageStore {
        async fn append_message(
            &self,
            room_id: &RoomId,
            sender: &Identity,
            content: &str,
        ) -> Result<Message, ChatError> {
            if self.unavailable {
                return Err(StoreError::unavailable("store is down").into());
            }
            Ok(Message::new(
                MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                room_id.clone(),
                sender.clone(),
                content,
                chrono::Utc::now(),
            ))
        }

        async fn read_messages(&self, _room_id: &RoomId) -> Result<Vec<Message>, ChatError> {
            Ok(vec![])
        }
    }

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
        relay: MessageRelay,
    }

    fn setup(store: StubMessageStore) -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new(64));
        let directory = Arc::new(RoomDirectory::new(
            Arc::new(OpenRoomStore),
            PresenceNotifier::new(registry.clone()),
        ));
        let relay = MessageRelay::new(directory.clone(), registry.clone(), Arc::new(store));
        Fixture {
            registry,
            directory,
            relay,
        }
    }

    fn message_contents(events: Vec<ServerEvent>) -> Vec<String> {
        events
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::Message { content, .. } => Some(content),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_persistence() {
        let fix = setup(StubMessageStore::new());
        let err = fix
            .relay
            .send(&RoomId::from("general"), &Identity::from("alice"), "  ")
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::EmptyContent);
    }

    #[tokio::test]
    async fn send_to_unknown_room_fails() {
        let fix = setup(StubMessageStore::new());
        let err = fix
            .relay
            .send(&RoomId::from("nowhere"), &Identity::from("alice"), "hi")
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::room_not_found("nowhere"));
    }

    #[tokio::test]
    async fn accepted_sends_reach_every_member_in_order() {
        let fix = setup(StubMessageStore::new());
        let general = RoomId::from("general");

        let (alice, mut alice_rx) = fix.registry.register();
        fix.registry
            .bind_identity(alice.id(), Identity::from("alice"))
            .unwrap();
        fix.directory.join(&general, &alice).await.unwrap();

        let (bob, mut bob_rx) = fix.registry.register();
        fix.registry
            .bind_identity(bob.id(), Identity::from("bob"))
            .unwrap();
        fix.directory.join(&general, &bob).await.unwrap();

        fix.relay
            .send(&general, &Identity::from("alice"), "first")
            .await
            .unwrap();
        fix.relay
            .send(&general, &Identity::from("alice"), "second")
            .await
            .unwrap();

        let mut alice_events = Vec::new();
        let mut bob_events = Vec::new();
        while let Ok(event) = alice_rx.try_recv() {
            alice_events.push(event);
        }
        while let Ok(event) = bob_rx.try_recv() {
            bob_events.push(event);
        }

        assert_eq!(message_contents(alice_events), vec!["first", "second"]);
        assert_eq!(message_contents(bob_events), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn sends_are_isolated_per_room() {
        let fix = setup(StubMessageStore::new());
        let r1 = RoomId::from("r1");
        let r2 = RoomId::from("r2");

        let (alice, mut alice_rx) = fix.registry.register();
        fix.registry
            .bind_identity(alice.id(), Identity::from("alice"))
            .unwrap();
        fix.directory.join(&r1, &alice).await.unwrap();

        let (bob, mut bob_rx) = fix.registry.register();
        fix.registry
            .bind_identity(bob.id(), Identity::from("bob"))
            .unwrap();
        fix.directory.join(&r2, &bob).await.unwrap();

        fix.relay
            .send(&r1, &Identity::from("alice"), "only r1")
            .await
            .unwrap();

        let mut alice_events = Vec::new();
        while let Ok(event) = alice_rx.try_recv() {
            alice_events.push(event);
        }
        assert_eq!(message_contents(alice_events), vec!["only r1"]);

        // bob 在 r2：除了自己的 presence 外不应收到任何消息
        let mut bob_events = Vec::new();
        while let Ok(event) = bob_rx.try_recv() {
            bob_events.push(event);
        }
        assert!(message_contents(bob_events).is_empty());
    }

    #[tokio::test]
    async fn store_outage_is_surfaced_and_nothing_is_delivered() {
        let fix = setup(StubMessageStore::down());
        let general = RoomId::from("general");

        let (alice, mut alice_rx) = fix.registry.register();
        fix.registry
            .bind_identity(alice.id(), Identity::from("alice"))
            .unwrap();
        fix.directory.join(&general, &alice).await.unwrap();
        let _ = alice_rx.recv().await; // 加入时的 presence

        let err = fix
            .relay
            .send(&general, &Identity::from("alice"), "hi")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "StoreUnavailable");
        // 没有乐观回显
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn departed_connection_is_skipped_during_fanout() {
        let fix = setup(StubMessageStore::new());
        let general = RoomId::from("general");

        let (alice, mut alice_rx) = fix.registry.register();
        fix.registry
            .bind_identity(alice.id(), Identity::from("alice"))
            .unwrap();
        fix.directory.join(&general, &alice).await.unwrap();

        let (bob, bob_rx) = fix.registry.register();
        fix.registry
            .bind_identity(bob.id(), Identity::from("bob"))
            .unwrap();
        fix.directory.join(&general, &bob).await.unwrap();

        // bob 突然断开：注册表先摘除，目录还没来得及清理
        drop(bob_rx);
        fix.registry.unregister(bob.id());

        // 扇出必须既不投给 bob 也不报错
        fix.relay
            .send(&general, &Identity::from("alice"), "hi")
            .await
            .unwrap();

        let mut alice_events = Vec::new();
        while let Ok(event) = alice_rx.try_recv() {
            alice_events.push(event);
        }
        assert!(message_contents(alice_events).contains(&"hi".to_owned()));
    }
}
