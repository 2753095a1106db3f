//! 主应用程序入口
//!
//! 装配实时协调核心与 Web API 服务并启动。

use std::sync::Arc;

use application::{ConnectionRegistry, MessageRelay, PresenceNotifier, RoomDirectory};
use config::AppConfig;
use domain::{RoomDescriptor, RoomId, RoomKind};
use infrastructure::MemoryStore;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 读取环境变量配置
    let config = AppConfig::from_env();
    config.validate()?;

    // 内存存储，开箱自带一个对所有人开放的公共频道
    let store = Arc::new(MemoryStore::new(config.store.bcrypt_cost));
    store
        .create_room(
            RoomDescriptor {
                id: RoomId::new("general"),
                name: "General".to_string(),
                kind: RoomKind::Channel,
            },
            Vec::new(),
        )
        .await?;

    // 装配实时协调核心：注册表 -> 在线状态 -> 房间目录 -> 消息中继
    let registry = Arc::new(ConnectionRegistry::new(config.gateway.outbound_capacity));
    let presence = PresenceNotifier::new(registry.clone());
    let directory = Arc::new(RoomDirectory::new(store.clone(), presence));
    let relay = Arc::new(MessageRelay::new(
        directory.clone(),
        registry.clone(),
        store.clone(),
    ));

    let state = AppState::new(registry, directory, relay, store);

    // 启动 Web 服务器
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("chat server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
