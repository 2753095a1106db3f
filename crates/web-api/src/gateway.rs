//! 会话网关
//!
//! 每条 WebSocket 连接的状态机：Connected(未认证) -> Authenticated
//! -> 反复加入/离开 0..N 个房间 -> Closed。入站事件在连接自己的
//! 接收任务里按到达顺序同步分发；出站事件经注册表的有界队列由
//! 发送任务串行写出。
//!
//! 所有协议错误都是连接级、非致命的：回一个 `error` 帧，连接
//! 保持打开，客户端可以重试。只有传输层断开才结束连接。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use application::Connection;
use domain::{ChatError, ChatResult, ClientEvent, ServerEvent};

use crate::state::AppState;

/// 处理一条已升级的 WebSocket 连接，直到断开。
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn, mut outbound) = state.registry.register();
    tracing::info!(connection_id = %conn.id(), "WebSocket 连接已建立");

    let (mut sender, mut incoming) = socket.split();

    // 发送任务：出站事件串行写到 socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize outbound event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // 接收任务：入站事件按到达顺序分发
    let recv_state = state.clone();
    let recv_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                WsMessage::Text(text) => {
                    handle_frame(&recv_state, &recv_conn, text.as_str()).await;
                }
                WsMessage::Close(_) => {
                    tracing::debug!(connection_id = %recv_conn.id(), "client closed connection");
                    break;
                }
                // axum 自动应答 ping；二进制帧不在协议里
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                WsMessage::Binary(_) => {
                    tracing::debug!(connection_id = %recv_conn.id(), "ignoring binary frame");
                }
            }
        }
    });

    // 任一方向结束（包括网络异常断开）都算连接结束
    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut recv_task => {}
    }

    // 清理开始前先终止并等掉幸存的那个任务：否则接收任务还可能
    // 把缓冲里的晚到 join 分发出去，与清理并发地把已关闭的连接
    // 重新塞回房间
    send_task.abort();
    recv_task.abort();
    let _ = tokio::join!(send_task, recv_task);

    // 断开清理：先退出所有房间（触发各房间的 presence 广播），
    // 再从注册表摘除。优雅关闭和异常断开走同一条路径。
    state.directory.leave_all(&conn).await;
    state.registry.unregister(conn.id());
    tracing::info!(connection_id = %conn.id(), "WebSocket 连接已断开，房间成员已清理");
}

/// 解析并分发一帧入站事件；任何错误都回错误帧、保持连接。
async fn handle_frame(state: &AppState, conn: &Arc<Connection>, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(connection_id = %conn.id(), error = %err, "malformed client event");
            conn.deliver(ServerEvent::Error {
                code: "InvalidEvent".to_owned(),
                detail: err.to_string(),
            });
            return;
        }
    };

    if let Err(err) = dispatch(state, conn, event).await {
        conn.deliver(ServerEvent::error(&err));
    }
}

/// 显式的事件分发表。认证之外的所有操作都要求已绑定身份。
async fn dispatch(state: &AppState, conn: &Arc<Connection>, event: ClientEvent) -> ChatResult<()> {
    use domain::UserStore;

    match event {
        ClientEvent::Auth { token } => {
            // 认证失败不断开连接，客户端可以换令牌重试
            let identity = state.store.resolve_token(&token).await?;
            state.registry.bind_identity(conn.id(), identity.clone())?;
            tracing::info!(connection_id = %conn.id(), identity = %identity, "connection authenticated");
            Ok(())
        }
        ClientEvent::Join { room_id } => state.directory.join(&room_id, conn).await,
        ClientEvent::Leave { room_id } => {
            if conn.identity().is_none() {
                return Err(ChatError::Unauthorized);
            }
            state.directory.leave(&room_id, conn).await;
            Ok(())
        }
        ClientEvent::Send { room_id, content } => {
            let identity = conn.identity().ok_or(ChatError::Unauthorized)?;
            // 先加入才能发言：挡住房间外的骚扰，也和 presence 模型一致
            if !state.directory.is_member(&room_id, conn.id()) {
                return Err(ChatError::forbidden(room_id.as_str()));
            }
            state.relay.send(&room_id, &identity, &content).await?;
            Ok(())
        }
    }
}
