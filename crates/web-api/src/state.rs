use std::sync::Arc;

use application::{ConnectionRegistry, MessageRelay, RoomDirectory};
use infrastructure::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub directory: Arc<RoomDirectory>,
    pub relay: Arc<MessageRelay>,
    pub store: Arc<MemoryStore>,
}

impl AppState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
        relay: Arc<MessageRelay>,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            registry,
            directory,
            relay,
            store,
        }
    }
}
