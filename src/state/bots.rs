//! Bot attachment and population control
//!
//! Bots live in the same registries as humans: a synthetic connection,
//! a participation record per game, and a per-room session for fatigue
//! tracking. Scheduled answers carry the round's generation stamp and
//! go through the same committed-scoring path as human submissions.

use super::{AppState, BotSession};
use crate::bots::{decision, population};
use crate::types::*;

impl AppState {
    /// Attach one bot to a room: synthetic connection, participation
    /// record, session entry, and mid-round eligibility
    pub async fn attach_bot(&self, room_id: &RoomId, bot: &BotProfile) {
        let Some(game_id) = self.current_game_id(room_id).await else {
            return;
        };
        let pg = self
            .repo
            .upsert_player_game(&game_id, &bot.id, &bot.name, true, self.cfg.energy_max)
            .await;

        let connection_id = ulid::Ulid::new().to_string();
        self.connections.write().await.insert(
            connection_id.clone(),
            ClientConnection {
                id: connection_id.clone(),
                player_id: bot.id.clone(),
                player_game_id: pg.id.clone(),
                game_id,
                room_id: room_id.clone(),
                display_name: bot.name.clone(),
                is_bot: true,
            },
        );

        self.bot_sessions
            .write()
            .await
            .entry(room_id.clone())
            .or_default()
            .insert(
                bot.id.clone(),
                BotSession {
                    bot_id: bot.id.clone(),
                    connection_id,
                    player_game_id: pg.id.clone(),
                    games_played: 0,
                },
            );

        let mut live = self.live.write().await;
        if let Some(lg) = live.get_mut(room_id) {
            if !lg.eligible.contains(&pg.id) {
                lg.eligible.push(pg.id);
            }
        }
        drop(live);

        tracing::debug!(room = %room_id, bot = %bot.id, "bot attached");
        self.broadcast_lobby(room_id).await;
    }

    pub async fn detach_bot(&self, room_id: &RoomId, bot_id: &BotId) {
        let session = {
            let mut sessions = self.bot_sessions.write().await;
            let Some(room_bots) = sessions.get_mut(room_id) else {
                return;
            };
            room_bots.remove(bot_id)
        };
        if let Some(session) = session {
            self.connections.write().await.remove(&session.connection_id);
            tracing::debug!(room = %room_id, bot = %bot_id, "bot detached");
            self.broadcast_lobby(room_id).await;
        }
    }

    pub(crate) async fn detach_all_bots(&self, room_id: &RoomId) {
        let removed = self.bot_sessions.write().await.remove(room_id);
        if let Some(room_bots) = removed {
            let mut conns = self.connections.write().await;
            for session in room_bots.values() {
                conns.remove(&session.connection_id);
            }
        }
    }

    pub async fn bot_count(&self, room_id: &RoomId) -> usize {
        self.bot_sessions
            .read()
            .await
            .get(room_id)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Draw a decision for every attached bot and arm its answer timer.
    /// Each timer revalidates the stamp when it fires; a round that has
    /// moved on silently swallows the answer.
    pub(crate) async fn schedule_bot_answers(
        &self,
        room_id: &RoomId,
        uid: u64,
        question: &Question,
        round_ms: u64,
    ) {
        let sessions: Vec<(BotId, PlayerGameId)> = self
            .bot_sessions
            .read()
            .await
            .get(room_id)
            .map(|bots| {
                bots.values()
                    .map(|s| (s.bot_id.clone(), s.player_game_id.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for (bot_id, pg_id) in sessions {
            let Some(bot) = self.repo.get_bot(&bot_id).await else {
                continue;
            };
            let decision = {
                let mut rng = self.rng.lock().await;
                decision::decide(&bot, question, round_ms, round_ms, &mut rng)
            };

            let st = self.clone();
            let rid = room_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(decision.delay_ms)).await;
                st.apply_bot_answer(&rid, uid, &pg_id, decision.outcome).await;
            });
        }
    }

    /// Bring one room toward its share of the hour's global bot target.
    /// Over target, attached bots sample a leave probability driven by
    /// fatigue and overshoot; under target, catalog bots sample a join
    /// probability scaled by their day-part availability.
    pub async fn rebalance_room(&self, room_id: &RoomId, hour: u32) {
        let rooms = self.repo.open_public_rooms().await;
        let weights: Vec<f64> = rooms.iter().map(|r| r.traffic_weight).collect();
        let (global, shares) = {
            let mut rng = self.rng.lock().await;
            let global = population::global_target(self.cfg.bot_global_max, hour, &mut rng);
            (global, population::apportion(global, &weights))
        };
        // A room outside the public rotation gets no bots at all
        let target = rooms
            .iter()
            .position(|r| &r.id == room_id)
            .map(|i| shares[i])
            .unwrap_or(0);

        let current: Vec<BotSession> = self
            .bot_sessions
            .read()
            .await
            .get(room_id)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default();

        if current.len() > target {
            let over_ratio = (current.len() - target) as f64 / target.max(1) as f64;
            let mut leaving = Vec::new();
            {
                let mut rng = self.rng.lock().await;
                let mut count = current.len();
                for session in &current {
                    if count <= target {
                        break;
                    }
                    let p = population::disconnect_probability(session.games_played, over_ratio);
                    if rand::Rng::random_bool(&mut *rng, p) {
                        leaving.push(session.bot_id.clone());
                        count -= 1;
                    }
                }
            }
            for bot_id in leaving {
                self.detach_bot(room_id, &bot_id).await;
            }
        } else if current.len() < target {
            let mut need = target - current.len();
            let daypart = DayPart::from_hour(hour);

            // One bot identity sits in at most one room at a time
            let attached: Vec<BotId> = {
                let sessions = self.bot_sessions.read().await;
                sessions
                    .values()
                    .flat_map(|room_bots| room_bots.keys().cloned())
                    .collect()
            };

            let mut joining = Vec::new();
            {
                let mut rng = self.rng.lock().await;
                for bot in self.repo.all_bots().await {
                    if need == 0 {
                        break;
                    }
                    if attached.contains(&bot.id) {
                        continue;
                    }
                    let avail =
                        population::jittered_availability(bot.availability_for(daypart), &mut *rng);
                    let p = population::connect_probability(need, target, avail);
                    if rand::Rng::random_bool(&mut *rng, p) {
                        joining.push(bot);
                        need -= 1;
                    }
                }
            }
            for bot in joining {
                self.attach_bot(room_id, &bot).await;
            }
        }

        let attached = self.bot_count(room_id).await;
        tracing::debug!(
            room = %room_id,
            hour,
            global,
            target,
            attached,
            "room rebalanced"
        );
    }

    /// Periodic sweep over every open public room
    pub async fn rebalance_public_rooms(&self, hour: u32) {
        for room in self.repo.open_public_rooms().await {
            self.rebalance_room(&room.id, hour).await;
        }
    }
}
