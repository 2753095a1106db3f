//! 在线状态通知器
//!
//! 每次房间成员变更后，重新计算该房间的在线身份列表并把
//! 全量快照推给所有在线成员。只由加入/离开的副作用触发，
//! 不定时推送，发消息也不触发。
//!
//! 推全量而不是增量是刻意的取舍：客户端永远不需要归并部分更新，
//! 丢失一次推送会在下一次变更时自愈。

use std::sync::Arc;

use domain::{ConnectionId, Identity, RoomId, ServerEvent};

use crate::registry::ConnectionRegistry;

pub struct PresenceNotifier {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 句柄是否仍在注册表里。房间目录用它挡掉与断开清理
    /// 竞争的晚到 join。
    pub(crate) fn is_connected(&self, handle: ConnectionId) -> bool {
        self.registry.get(handle).is_some()
    }

    /// 给定房间成员快照，推送在线身份全量列表。
    ///
    /// 由房间目录在该房间的排序保护下调用，保证 presence 推送
    /// 与同一房间的其他事件保持提交顺序。成员快照里已失效的
    /// 句柄由注册表静默跳过。
    pub(crate) fn push_snapshot(&self, room_id: &RoomId, members: &[ConnectionId]) {
        let mut identities: Vec<Identity> = members
            .iter()
            .filter_map(|handle| self.registry.get(*handle))
            .filter_map(|conn| conn.identity())
            .collect();
        identities.sort();
        identities.dedup();

        tracing::debug!(
            room_id = %room_id,
            online = identities.len(),
            "broadcasting presence snapshot"
        );

        let event = ServerEvent::presence(room_id.clone(), identities);
        for handle in members {
            self.registry.deliver(*handle, event.clone());
        }
    }
}
