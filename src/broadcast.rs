//! Room broadcast fabric
//!
//! The engine only assumes "all currently joined connections receive the
//! event"; the capability is a trait so tests can swap in a recording
//! implementation.

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::RoomId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

#[async_trait]
pub trait RoomBroadcaster: Send + Sync {
    /// Fan a message out to every connection joined to the room
    async fn broadcast(&self, room_id: &RoomId, msg: ServerMessage);
    /// Join the room's channel
    async fn subscribe(&self, room_id: &RoomId) -> broadcast::Receiver<ServerMessage>;
    /// Drop the room's channel once the room is gone
    async fn drop_room(&self, room_id: &RoomId);
}

/// Production broadcaster: one tokio broadcast channel per room
#[derive(Default)]
pub struct ChannelBroadcaster {
    channels: RwLock<HashMap<RoomId, broadcast::Sender<ServerMessage>>>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, room_id: &RoomId) -> broadcast::Sender<ServerMessage> {
        let mut channels = self.channels.write().await;
        channels
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(256).0)
            .clone()
    }
}

#[async_trait]
impl RoomBroadcaster for ChannelBroadcaster {
    async fn broadcast(&self, room_id: &RoomId, msg: ServerMessage) {
        // No receivers is fine (empty room)
        let _ = self.sender(room_id).await.send(msg);
    }

    async fn subscribe(&self, room_id: &RoomId) -> broadcast::Receiver<ServerMessage> {
        self.sender(room_id).await.subscribe()
    }

    async fn drop_room(&self, room_id: &RoomId) {
        self.channels.write().await.remove(room_id);
    }
}

/// Test broadcaster that records everything it is asked to send
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub sent: tokio::sync::Mutex<Vec<(RoomId, ServerMessage)>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages_for(&self, room_id: &RoomId) -> Vec<ServerMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(r, _)| r == room_id)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl RoomBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, room_id: &RoomId, msg: ServerMessage) {
        self.sent.lock().await.push((room_id.clone(), msg));
    }

    async fn subscribe(&self, _room_id: &RoomId) -> broadcast::Receiver<ServerMessage> {
        broadcast::channel(8).0.subscribe()
    }

    async fn drop_room(&self, _room_id: &RoomId) {}
}

/// Spawn the periodic bot rebalance sweep so public rooms fill even when
/// no game is ending in them
pub fn spawn_bot_sweeper(state: Arc<AppState>) {
    let period = Duration::from_secs(state.cfg.bot_sweep_secs.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let hour = chrono::Timelike::hour(&chrono::Local::now());
            state.rebalance_public_rooms(hour).await;
        }
    });
}
