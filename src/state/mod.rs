mod answer;
mod bots;
mod game;
mod room;

use crate::broadcast::RoomBroadcaster;
use crate::config::Config;
use crate::repo::Repository;
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Authoritative live state for one room's current round. Rebuilt on
/// every round start, discarded when the room drains or the game ends.
#[derive(Debug, Clone)]
pub struct LiveGame {
    pub game_id: GameId,
    pub question_ids: Vec<QuestionId>,
    pub index: usize,
    /// Generation stamp; any timer or bot callback scheduled for an
    /// older value must discard itself at fire time
    pub round_uid: u64,
    pub round_start_ms: u64,
    pub ends_at_ms: u64,
    /// Player-games eligible to score this game
    pub eligible: Vec<PlayerGameId>,
    pub answered: HashSet<PlayerGameId>,
    /// Free-text attempts used this round, per player-game
    pub attempts: HashMap<PlayerGameId, u32>,
    /// Scored-answer arrival order this round, for tie-breaks
    pub arrival: Vec<PlayerGameId>,
    /// How many text-correct answers arrived so far (speed bonus rank)
    pub text_correct: usize,
}

impl LiveGame {
    pub fn current_question_id(&self) -> Option<&QuestionId> {
        self.question_ids.get(self.index)
    }

    pub fn arrival_ranks(&self) -> HashMap<PlayerGameId, usize> {
        self.arrival
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect()
    }
}

/// Per-room record of an attached bot
#[derive(Debug, Clone)]
pub struct BotSession {
    pub bot_id: BotId,
    pub connection_id: ConnectionId,
    pub player_game_id: PlayerGameId,
    /// Games this bot has played in the room this session (fatigue input)
    pub games_played: u32,
}

/// Shared application state. Each room's live state sits behind one
/// lock, so all round mutations for a room happen on a single timeline.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub repo: Repository,
    pub broadcaster: Arc<dyn RoomBroadcaster>,
    /// Live round state per room; absent means the room is in lobby
    pub live: Arc<RwLock<HashMap<RoomId, LiveGame>>>,
    /// Connection registry, bots included as synthetic entries
    pub connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,
    /// The current (non-ended) game of each room
    pub room_games: Arc<RwLock<HashMap<RoomId, GameId>>>,
    /// Attached bots per room
    pub bot_sessions: Arc<RwLock<HashMap<RoomId, HashMap<BotId, BotSession>>>>,
    /// Gameplay RNG: question sampling, bot draws, jitter. Seedable for
    /// deterministic runs; distinct from the choice-shuffle PRNG.
    pub rng: Arc<Mutex<StdRng>>,
    round_uid_seq: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(cfg: Config, broadcaster: Arc<dyn RoomBroadcaster>) -> Self {
        let rng = match cfg.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            cfg,
            repo: Repository::new(),
            broadcaster,
            live: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
            room_games: Arc::new(RwLock::new(HashMap::new())),
            bot_sessions: Arc::new(RwLock::new(HashMap::new())),
            rng: Arc::new(Mutex::new(rng)),
            round_uid_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Next round generation stamp, monotonically increasing
    pub(crate) fn next_round_uid(&self) -> u64 {
        self.round_uid_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn now_ms() -> u64 {
        chrono::Utc::now().timestamp_millis() as u64
    }

    /// Current game id of a room, if any
    pub async fn current_game_id(&self, room_id: &RoomId) -> Option<GameId> {
        self.room_games.read().await.get(room_id).cloned()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::broadcast::RecordingBroadcaster;

    /// AppState wired with a recording broadcaster and a fixed RNG seed
    pub fn test_state() -> (AppState, Arc<RecordingBroadcaster>) {
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let cfg = Config {
            rng_seed: Some(42),
            round_ms: 10_000,
            ..Config::default()
        };
        (AppState::new(cfg, broadcaster.clone()), broadcaster)
    }
}
