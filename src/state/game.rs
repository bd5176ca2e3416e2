//! Game and round scheduling
//!
//! The per-room state machine: lobby -> running -> ended, with the round
//! sub-cycle driven by spawned timers. Every timer captures the round's
//! generation stamp (`round_uid`) and re-checks it under the lock at
//! fire time, so a superseded timer is a silent no-op instead of a
//! corruption source.

use super::{AppState, LiveGame};
use crate::error::EngineError;
use crate::leaderboard;
use crate::protocol::{MaskedQuestion, ServerMessage};
use crate::types::*;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Per-room-difficulty probability of drawing each question bucket 1-4
const BUCKET_DISTRIBUTIONS: [[f64; 4]; 10] = [
    [0.85, 0.15, 0.00, 0.00],
    [0.70, 0.30, 0.00, 0.00],
    [0.50, 0.40, 0.10, 0.00],
    [0.35, 0.45, 0.20, 0.00],
    [0.20, 0.40, 0.40, 0.00],
    [0.10, 0.40, 0.40, 0.10],
    [0.05, 0.30, 0.45, 0.20],
    [0.00, 0.20, 0.45, 0.35],
    [0.00, 0.10, 0.40, 0.50],
    [0.00, 0.05, 0.30, 0.65],
];

/// Largest-remainder rounding of the bucket distribution into integer
/// quotas summing exactly to `total`
pub fn bucket_quotas(difficulty: u8, total: usize) -> [usize; 4] {
    let probs = BUCKET_DISTRIBUTIONS[usize::from(difficulty.clamp(1, 10)) - 1];
    let mut quotas = [0usize; 4];
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(4);
    let mut assigned = 0;

    for (i, p) in probs.iter().enumerate() {
        let exact = p * total as f64;
        quotas[i] = exact.floor() as usize;
        assigned += quotas[i];
        remainders.push((i, exact - exact.floor()));
    }
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for k in 0..(total - assigned) {
        quotas[remainders[k % 4].0] += 1;
    }
    quotas
}

impl AppState {
    /// Difficulty-weighted question selection for a room, with banned
    /// themes excluded and short buckets backfilled from anywhere
    pub(crate) async fn select_questions(&self, room: &Room) -> Result<Vec<QuestionId>, EngineError> {
        let quotas = bucket_quotas(room.difficulty, room.question_count);
        let mut rng = self.rng.lock().await;
        let mut picked: Vec<QuestionId> = Vec::with_capacity(room.question_count);

        for (i, quota) in quotas.iter().enumerate() {
            if *quota == 0 {
                continue;
            }
            let bucket = (i + 1) as u8;
            let sampled = self
                .repo
                .sample_questions(Some(bucket), *quota, &room.banned_themes, &picked, &mut rng)
                .await;
            picked.extend(sampled.into_iter().map(|q| q.id));
        }

        // Backfill any shortage with unconstrained picks
        if picked.len() < room.question_count {
            let missing = room.question_count - picked.len();
            let sampled = self
                .repo
                .sample_questions(None, missing, &room.banned_themes, &picked, &mut rng)
                .await;
            picked.extend(sampled.into_iter().map(|q| q.id));
        }

        if picked.is_empty() {
            return Err(EngineError::NoQuestionsAvailable);
        }
        picked.shuffle(&mut *rng);
        Ok(picked)
    }

    /// Start the room's current game: pick questions, reset the roster,
    /// mark the game running, and begin round 0
    pub async fn start_game(&self, room_id: &RoomId) -> Result<(), EngineError> {
        let room = self
            .repo
            .get_room(room_id)
            .await
            .ok_or(EngineError::RoomNotFound)?;
        if room.status != RoomStatus::Open {
            return Err(EngineError::RoomClosed);
        }
        let game_id = self
            .current_game_id(room_id)
            .await
            .ok_or(EngineError::GameNotFound)?;

        // Check-and-reserve under one write guard, before any awaited
        // selection work. A concurrent start_game sees the reservation
        // and returns instead of double-starting round 0.
        {
            let mut live = self.live.write().await;
            if live.contains_key(room_id) {
                tracing::debug!(room = %room_id, "start_game ignored, game already running");
                return Ok(());
            }
            live.insert(
                room_id.clone(),
                LiveGame {
                    game_id: game_id.clone(),
                    question_ids: Vec::new(),
                    index: 0,
                    round_uid: 0,
                    round_start_ms: 0,
                    ends_at_ms: 0,
                    eligible: Vec::new(),
                    answered: HashSet::new(),
                    attempts: HashMap::new(),
                    arrival: Vec::new(),
                    text_correct: 0,
                },
            );
        }

        let question_ids = match self.select_questions(&room).await {
            Ok(q) => q,
            Err(e) => {
                // Back the reservation out; the room stays in lobby.
                // A question shortage is the one submission-path error
                // that goes room-wide.
                self.live.write().await.remove(room_id);
                self.broadcaster
                    .broadcast(
                        room_id,
                        ServerMessage::Error {
                            code: e.code().to_string(),
                            msg: e.to_string(),
                        },
                    )
                    .await;
                return Err(e);
            }
        };

        let eligible = self.roster_player_game_ids(room_id).await;
        {
            let mut live = self.live.write().await;
            let Some(lg) = live.get_mut(room_id) else {
                // Drained while questions were being selected
                return Ok(());
            };
            lg.question_ids = question_ids.clone();
            lg.eligible = eligible.clone();
        }

        self.repo
            .reset_player_games(&eligible, self.cfg.energy_max)
            .await;
        self.repo.set_game_questions(&game_id, question_ids).await;
        self.repo.set_game_status(&game_id, GameStatus::Running).await;

        tracing::info!(room = %room_id, game = %game_id, "game started");
        self.start_round(room_id, 0).await;
        Ok(())
    }

    /// Begin a round: stamp a fresh round_uid, clear the per-round maps,
    /// broadcast the masked question, arm the round timer, and schedule
    /// every attached bot
    pub fn start_round<'a>(
        &'a self,
        room_id: &'a RoomId,
        index: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.start_round_inner(room_id, index))
    }

    async fn start_round_inner(&self, room_id: &RoomId, index: usize) {
        let Some(room) = self.repo.get_room(room_id).await else {
            return;
        };
        let uid = self.next_round_uid();
        let now = Self::now_ms();
        let roster = self.roster_player_game_ids(room_id).await;

        let (question_id, total) = {
            let mut live = self.live.write().await;
            let Some(lg) = live.get_mut(room_id) else {
                return;
            };
            lg.index = index;
            lg.round_uid = uid;
            lg.round_start_ms = now;
            lg.ends_at_ms = now + room.round_ms;
            lg.answered.clear();
            lg.attempts.clear();
            lg.arrival.clear();
            lg.text_correct = 0;
            for pg_id in roster {
                if !lg.eligible.contains(&pg_id) {
                    lg.eligible.push(pg_id);
                }
            }
            match lg.current_question_id() {
                Some(q) => (q.clone(), lg.question_ids.len()),
                None => return,
            }
        };

        let Some(question) = self.repo.get_question(&question_id).await else {
            tracing::error!(room = %room_id, question = %question_id, "live question missing");
            return;
        };

        self.broadcaster
            .broadcast(
                room_id,
                ServerMessage::RoundBegin {
                    index,
                    total,
                    ends_at_ms: now + room.round_ms,
                    question: MaskedQuestion::from(&question),
                    text_lives: self.cfg.text_lives,
                },
            )
            .await;
        self.broadcast_leaderboard(room_id).await;

        tracing::debug!(room = %room_id, index, uid, "round started");

        // Round timer
        let st = self.clone();
        let rid = room_id.clone();
        let duration = room.round_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration)).await;
            st.end_round_if_current(&rid, uid).await;
        });

        self.schedule_bot_answers(room_id, uid, &question, room.round_ms)
            .await;
    }

    /// Round timer target. Does nothing when the stamp is stale.
    pub async fn end_round_if_current(&self, room_id: &RoomId, uid: u64) {
        let snapshot = {
            let mut live = self.live.write().await;
            match live.get_mut(room_id) {
                Some(lg) if lg.round_uid == uid => {
                    // Close the submission window; anything arriving
                    // during the inter-round gap is rejected
                    lg.ends_at_ms = lg.ends_at_ms.min(Self::now_ms());
                    Some((lg.index, lg.question_ids.len()))
                }
                _ => {
                    tracing::debug!(room = %room_id, uid, "stale round timer discarded");
                    None
                }
            }
        };
        let Some((index, total)) = snapshot else {
            return;
        };

        let question_id = {
            let live = self.live.read().await;
            live.get(room_id)
                .and_then(|lg| lg.current_question_id().cloned())
        };
        let Some(question_id) = question_id else {
            return;
        };
        let Some(question) = self.repo.get_question(&question_id).await else {
            return;
        };
        let correct = question.correct_choice().cloned();

        let leaderboard = self.build_leaderboard(room_id).await;
        self.broadcaster
            .broadcast(
                room_id,
                ServerMessage::RoundEnd {
                    index,
                    correct_choice_id: correct.as_ref().map(|c| c.id.clone()).unwrap_or_default(),
                    correct_label: correct.map(|c| c.label).unwrap_or_default(),
                    leaderboard,
                },
            )
            .await;

        if index + 1 < total {
            // Inter-round gap, then the next question
            let st = self.clone();
            let rid = room_id.clone();
            let gap = self.cfg.round_gap_ms;
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(gap)).await;
                let still_current = {
                    let live = st.live.read().await;
                    live.get(&rid).is_some_and(|lg| lg.round_uid == uid)
                };
                if still_current {
                    st.start_round(&rid, index + 1).await;
                } else {
                    tracing::debug!(room = %rid, uid, "stale gap timer discarded");
                }
            });
        } else {
            self.finish_game(room_id).await;
        }
    }

    /// Last round is over: end the game, pre-create the next one with
    /// the same roster, show the final leaderboard, and schedule the
    /// auto-start
    async fn finish_game(&self, room_id: &RoomId) {
        let Some(lg) = self.live.write().await.remove(room_id) else {
            return;
        };
        self.repo.set_game_status(&lg.game_id, GameStatus::Ended).await;

        let players = self.repo.player_games(&lg.eligible).await;
        let leaderboard = leaderboard::build(&players, &HashMap::new());
        self.broadcaster
            .broadcast(
                room_id,
                ServerMessage::FinalLeaderboard {
                    leaderboard,
                    display_ms: self.cfg.final_board_ms,
                },
            )
            .await;

        let next_game = self.repo.create_game(room_id).await;
        self.room_games
            .write()
            .await
            .insert(room_id.clone(), next_game.id.clone());
        self.carry_roster_forward(room_id, &next_game.id).await;
        tracing::info!(room = %room_id, game = %lg.game_id, next = %next_game.id, "game ended");

        if let Some(room) = self.repo.get_room(room_id).await {
            if room.public {
                let hour = chrono::Timelike::hour(&chrono::Local::now());
                self.rebalance_room(room_id, hour).await;
            }
        }

        // Auto-start after the final leaderboard display
        let st = self.clone();
        let rid = room_id.clone();
        let next_id = next_game.id;
        let display = self.cfg.final_board_ms;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(display)).await;
            let still_expected = st.current_game_id(&rid).await == Some(next_id)
                && st.human_count(&rid).await > 0;
            if still_expected {
                if let Err(e) = st.start_game(&rid).await {
                    tracing::warn!(room = %rid, error = %e, "auto-start failed");
                }
            } else {
                tracing::debug!(room = %rid, "auto-start skipped");
            }
        });
    }

    /// Re-home every connection (and bot session) onto the new game's
    /// participation records
    async fn carry_roster_forward(&self, room_id: &RoomId, new_game_id: &GameId) {
        let conns = self.room_connections(room_id).await;
        let mut updates: Vec<(ConnectionId, PlayerGameId)> = Vec::with_capacity(conns.len());
        for conn in &conns {
            let pg = self
                .repo
                .upsert_player_game(
                    new_game_id,
                    &conn.player_id,
                    &conn.display_name,
                    conn.is_bot,
                    self.cfg.energy_max,
                )
                .await;
            updates.push((conn.id.clone(), pg.id));
        }

        let mut registry = self.connections.write().await;
        for (conn_id, pg_id) in &updates {
            if let Some(c) = registry.get_mut(conn_id) {
                c.game_id = new_game_id.clone();
                c.player_game_id = pg_id.clone();
            }
        }
        drop(registry);

        let mut sessions = self.bot_sessions.write().await;
        if let Some(room_bots) = sessions.get_mut(room_id) {
            for session in room_bots.values_mut() {
                session.games_played += 1;
                if let Some((_, pg_id)) = updates
                    .iter()
                    .find(|(cid, _)| cid == &session.connection_id)
                {
                    session.player_game_id = pg_id.clone();
                }
            }
        }
    }

    pub(crate) async fn roster_player_game_ids(&self, room_id: &RoomId) -> Vec<PlayerGameId> {
        let mut ids: Vec<PlayerGameId> = self
            .room_connections(room_id)
            .await
            .into_iter()
            .map(|c| c.player_game_id)
            .collect();
        ids.dedup();
        ids
    }

    /// Rebuild and broadcast the room's leaderboard from the latest
    /// persisted scores plus the current round's arrival order
    pub(crate) async fn broadcast_leaderboard(&self, room_id: &RoomId) {
        let leaderboard = self.build_leaderboard(room_id).await;
        self.broadcaster
            .broadcast(room_id, ServerMessage::LeaderboardUpdate { leaderboard })
            .await;
    }

    pub async fn build_leaderboard(&self, room_id: &RoomId) -> Vec<LeaderboardRow> {
        let (eligible, arrival) = {
            let live = self.live.read().await;
            match live.get(room_id) {
                Some(lg) => (lg.eligible.clone(), lg.arrival_ranks()),
                None => (self.roster_player_game_ids(room_id).await, HashMap::new()),
            }
        };
        let players = self.repo.player_games(&eligible).await;
        leaderboard::build(&players, &arrival)
    }
}
