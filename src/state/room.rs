//! Room lifecycle and the connection registry
//!
//! Rooms are created with a pre-created lobby game; joining upserts the
//! player's participation record for the room's current game. The
//! registry holds synthetic entries for attached bots, so the lobby
//! roster has a single source of truth.

use super::AppState;
use crate::error::EngineError;
use crate::protocol::{LobbyPlayer, ServerMessage};
use crate::types::*;
use rand::Rng;

impl AppState {
    /// Create a room (with its lobby game) and join the creator to it
    pub async fn create_room(
        &self,
        connection_id: &ConnectionId,
        display_name: String,
        public: bool,
        difficulty: u8,
        question_count: usize,
        banned_themes: Vec<String>,
    ) -> Result<ServerMessage, EngineError> {
        let player_id = ulid::Ulid::new().to_string();
        let join_code = self.generate_join_code().await;
        let room = Room {
            id: ulid::Ulid::new().to_string(),
            join_code,
            public,
            difficulty: difficulty.clamp(1, 10),
            banned_themes,
            question_count: question_count.clamp(1, 50),
            round_ms: self.cfg.round_ms,
            status: RoomStatus::Open,
            owner_id: player_id.clone(),
            traffic_weight: 5.0,
        };
        self.repo.insert_room(room.clone()).await;

        let game = self.repo.create_game(&room.id).await;
        self.room_games
            .write()
            .await
            .insert(room.id.clone(), game.id.clone());

        let welcome = self
            .register_connection(connection_id, &room, &game.id, player_id, display_name)
            .await;
        self.broadcast_lobby(&room.id).await;

        tracing::info!(room = %room.id, code = %room.join_code, public, "room created");
        Ok(welcome)
    }

    /// Join an open room by its code
    pub async fn join_room(
        &self,
        connection_id: &ConnectionId,
        join_code: &str,
        display_name: Option<String>,
    ) -> Result<ServerMessage, EngineError> {
        let room = self
            .repo
            .get_room_by_code(join_code)
            .await
            .ok_or(EngineError::RoomNotFound)?;
        if room.status != RoomStatus::Open {
            return Err(EngineError::RoomClosed);
        }
        let game_id = self
            .current_game_id(&room.id)
            .await
            .ok_or(EngineError::GameNotFound)?;

        let name = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                petname::petname(2, "-").unwrap_or_else(|| "anonymous-quokka".to_string())
            });

        let player_id = ulid::Ulid::new().to_string();
        let welcome = self
            .register_connection(connection_id, &room, &game_id, player_id, name)
            .await;
        self.broadcast_lobby(&room.id).await;
        Ok(welcome)
    }

    async fn register_connection(
        &self,
        connection_id: &ConnectionId,
        room: &Room,
        game_id: &GameId,
        player_id: PlayerId,
        display_name: String,
    ) -> ServerMessage {
        let pg = self
            .repo
            .upsert_player_game(game_id, &player_id, &display_name, false, self.cfg.energy_max)
            .await;

        self.connections.write().await.insert(
            connection_id.clone(),
            ClientConnection {
                id: connection_id.clone(),
                player_id,
                player_game_id: pg.id.clone(),
                game_id: game_id.clone(),
                room_id: room.id.clone(),
                display_name: display_name.clone(),
                is_bot: false,
            },
        );

        // A mid-round joiner becomes eligible immediately; the answered
        // set still guards double scoring
        let mut live = self.live.write().await;
        if let Some(lg) = live.get_mut(&room.id) {
            if !lg.eligible.contains(&pg.id) {
                lg.eligible.push(pg.id.clone());
            }
        }
        drop(live);

        ServerMessage::Welcome {
            room: room.clone(),
            game_id: game_id.clone(),
            player_game_id: pg.id,
            display_name,
            server_now: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Remove a connection. When the last human leaves, the room drains:
    /// pending timers are invalidated, live state is discarded, and the
    /// game reverts to lobby.
    pub async fn leave_room(&self, connection_id: &ConnectionId) {
        let conn = self.connections.write().await.remove(connection_id);
        let Some(conn) = conn else {
            return;
        };
        tracing::info!(room = %conn.room_id, player = %conn.player_game_id, "connection left");

        if self.human_count(&conn.room_id).await == 0 {
            self.drain_room(&conn.room_id).await;
        }
        self.broadcast_lobby(&conn.room_id).await;
    }

    /// Close a room for good. Owner only.
    pub async fn close_room(&self, connection_id: &ConnectionId) -> Result<(), EngineError> {
        let conn = self
            .connections
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or(EngineError::NotInRoom)?;
        let room = self
            .repo
            .get_room(&conn.room_id)
            .await
            .ok_or(EngineError::RoomNotFound)?;
        if room.owner_id != conn.player_id {
            return Err(EngineError::NotOwner);
        }

        self.repo.close_room(&room.id).await;
        self.drain_room(&room.id).await;
        self.detach_all_bots(&room.id).await;
        // Closed rooms never get another game; drop the mapping so the
        // map does not grow with every closed room
        self.room_games.write().await.remove(&room.id);
        self.broadcaster.drop_room(&room.id).await;
        tracing::info!(room = %room.id, "room closed");
        Ok(())
    }

    /// Discard live round state and revert the current game to lobby.
    /// Any timer still holding an old round_uid becomes a no-op.
    pub(crate) async fn drain_room(&self, room_id: &RoomId) {
        let removed = self.live.write().await.remove(room_id);
        if let Some(lg) = removed {
            self.repo
                .set_game_status(&lg.game_id, GameStatus::Lobby)
                .await;
            self.broadcaster
                .broadcast(room_id, ServerMessage::GameStopped)
                .await;
            tracing::info!(room = %room_id, game = %lg.game_id, "room drained, game back to lobby");
        }
    }

    pub async fn connection(&self, connection_id: &ConnectionId) -> Option<ClientConnection> {
        self.connections.read().await.get(connection_id).cloned()
    }

    pub async fn room_connections(&self, room_id: &RoomId) -> Vec<ClientConnection> {
        let mut conns: Vec<ClientConnection> = self
            .connections
            .read()
            .await
            .values()
            .filter(|c| &c.room_id == room_id)
            .cloned()
            .collect();
        conns.sort_by(|a, b| a.id.cmp(&b.id));
        conns
    }

    pub async fn human_count(&self, room_id: &RoomId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| &c.room_id == room_id && !c.is_bot)
            .count()
    }

    pub(crate) async fn broadcast_lobby(&self, room_id: &RoomId) {
        let players = self
            .room_connections(room_id)
            .await
            .into_iter()
            .map(|c| LobbyPlayer {
                player_game_id: c.player_game_id,
                display_name: c.display_name,
                is_bot: c.is_bot,
            })
            .collect();
        self.broadcaster
            .broadcast(room_id, ServerMessage::LobbyUpdate { players })
            .await;
    }

    async fn generate_join_code(&self) -> String {
        const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
        let mut rng = self.rng.lock().await;
        loop {
            let code: String = (0..6)
                .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
                .collect();
            // Codes are sparse enough that a collision retry is cheap
            if self.repo.get_room_by_code(&code).await.is_none() {
                return code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn test_create_room_registers_creator() {
        let (state, _) = test_state();
        let conn = "c1".to_string();
        let msg = state
            .create_room(&conn, "Ann".to_string(), false, 5, 10, vec![])
            .await
            .unwrap();

        let ServerMessage::Welcome { room, .. } = msg else {
            panic!("expected welcome");
        };
        assert_eq!(room.difficulty, 5);
        assert_eq!(state.human_count(&room.id).await, 1);
        assert!(state.current_game_id(&room.id).await.is_some());
    }

    #[tokio::test]
    async fn test_join_room_by_code() {
        let (state, _) = test_state();
        let msg = state
            .create_room(&"c1".to_string(), "Ann".to_string(), false, 5, 10, vec![])
            .await
            .unwrap();
        let ServerMessage::Welcome { room, .. } = msg else {
            panic!();
        };

        let joined = state
            .join_room(&"c2".to_string(), &room.join_code, Some("Bob".to_string()))
            .await
            .unwrap();
        assert!(matches!(joined, ServerMessage::Welcome { .. }));
        assert_eq!(state.human_count(&room.id).await, 2);
    }

    #[tokio::test]
    async fn test_join_unknown_code_fails() {
        let (state, _) = test_state();
        let err = state
            .join_room(&"c1".to_string(), "NOPE99", None)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::RoomNotFound);
    }

    #[tokio::test]
    async fn test_join_gets_a_generated_name_when_blank() {
        let (state, _) = test_state();
        let msg = state
            .create_room(&"c1".to_string(), "Ann".to_string(), false, 5, 10, vec![])
            .await
            .unwrap();
        let ServerMessage::Welcome { room, .. } = msg else {
            panic!();
        };

        let joined = state
            .join_room(&"c2".to_string(), &room.join_code, Some("   ".to_string()))
            .await
            .unwrap();
        let ServerMessage::Welcome { display_name, .. } = joined else {
            panic!();
        };
        assert!(!display_name.trim().is_empty());
    }

    #[tokio::test]
    async fn test_close_room_requires_owner() {
        let (state, _) = test_state();
        let msg = state
            .create_room(&"c1".to_string(), "Ann".to_string(), false, 5, 10, vec![])
            .await
            .unwrap();
        let ServerMessage::Welcome { room, .. } = msg else {
            panic!();
        };
        state
            .join_room(&"c2".to_string(), &room.join_code, Some("Bob".to_string()))
            .await
            .unwrap();

        assert_eq!(
            state.close_room(&"c2".to_string()).await.unwrap_err(),
            EngineError::NotOwner
        );
        assert!(state.close_room(&"c1".to_string()).await.is_ok());
        assert_eq!(
            state
                .join_room(&"c3".to_string(), &room.join_code, None)
                .await
                .unwrap_err(),
            EngineError::RoomClosed
        );
        // The room-to-game mapping is released with the room
        assert!(state.current_game_id(&room.id).await.is_none());
    }
}
