//! Answer collection and scoring
//!
//! Both submission paths share the same discipline: snapshot the round
//! under the lock, validate against the question, then re-take the lock
//! and re-check the round_uid and answered-set before committing. The
//! answered-set is what makes scoring idempotent per player per round.

use super::AppState;
use crate::error::EngineError;
use crate::protocol::{MaskedChoice, ServerMessage};
use crate::textmatch;
use crate::types::*;
use crate::{bots::decision::BotOutcome, shuffle};

/// Round facts captured under the lock for validation outside it
struct RoundSnapshot {
    uid: u64,
    question_id: QuestionId,
}

/// A committed scoring outcome, ready to persist and broadcast
struct ScoredSubmission {
    player_game_id: PlayerGameId,
    question_id: QuestionId,
    mode: AnswerMode,
    correct: bool,
    points: u32,
    response_ms: u64,
}

/// Speed bonus for the `rank`-th text-correct answer (0-based), linear
/// down to zero at the last possible rank
pub(crate) fn speed_bonus(max: u32, rank: usize, field: usize) -> u32 {
    if field <= 1 {
        return max;
    }
    let last = field - 1;
    if rank >= last {
        0
    } else {
        max * (last - rank) as u32 / last as u32
    }
}

impl AppState {
    /// This viewer's shuffled, label-only view of the choices
    pub async fn reveal_choices(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<ServerMessage, EngineError> {
        let conn = self
            .connection(connection_id)
            .await
            .ok_or(EngineError::NotInRoom)?;
        let snap = self.round_snapshot(&conn.room_id).await?;
        let question = self
            .repo
            .get_question(&snap.question_id)
            .await
            .ok_or(EngineError::NoQuestion)?;

        let cost = self.cfg.energy_reveal_cost;
        let energy = if cost > 0 {
            self.repo
                .adjust_energy(&conn.player_game_id, -i64::from(cost), self.cfg.energy_max)
                .await
                .ok_or(EngineError::NotEnoughEnergy)?
        } else {
            self.repo
                .get_player_game(&conn.player_game_id)
                .await
                .map(|pg| pg.energy)
                .unwrap_or(0)
        };

        let order = shuffle::shuffled_order(&question.id, &conn.player_id, question.choices.len());
        let choices = order
            .into_iter()
            .map(|i| MaskedChoice::from(&question.choices[i]))
            .collect();
        Ok(ServerMessage::MultipleChoice { choices, energy })
    }

    /// Multiple-choice submission: single-shot, fixed points
    pub async fn submit_choice(
        &self,
        connection_id: &ConnectionId,
        choice_id: &ChoiceId,
    ) -> Result<ServerMessage, EngineError> {
        let conn = self
            .connection(connection_id)
            .await
            .ok_or(EngineError::NotInRoom)?;
        let snap = self.round_snapshot(&conn.room_id).await?;
        let question = self
            .repo
            .get_question(&snap.question_id)
            .await
            .ok_or(EngineError::NoQuestion)?;
        let choice = question
            .choices
            .iter()
            .find(|c| &c.id == choice_id)
            .ok_or(EngineError::UnknownChoice)?;
        let correct = choice.is_correct;

        // Commit under the lock
        let response_ms = {
            let mut live = self.live.write().await;
            let lg = live.get_mut(&conn.room_id).ok_or(EngineError::RoundOver)?;
            if lg.round_uid != snap.uid || Self::now_ms() >= lg.ends_at_ms {
                return Err(EngineError::RoundOver);
            }
            if !lg.answered.insert(conn.player_game_id.clone()) {
                return Err(EngineError::AlreadyAnswered);
            }
            lg.arrival.push(conn.player_game_id.clone());
            Self::now_ms().saturating_sub(lg.round_start_ms)
        };

        let points = if correct { self.cfg.choice_points } else { 0 };
        self.finalize_submission(
            &conn.room_id,
            ScoredSubmission {
                player_game_id: conn.player_game_id.clone(),
                question_id: question.id.clone(),
                mode: AnswerMode::Choice,
                correct,
                points,
                response_ms,
            },
        )
        .await;

        let truth = question.correct_choice();
        Ok(ServerMessage::AnswerFeedback {
            correct,
            correct_choice_id: truth.map(|c| c.id.clone()),
            correct_label: truth.map(|c| c.label.clone()),
            response_ms,
            lives_left: self
                .cfg
                .text_lives
                .saturating_sub(self.attempts_used(&conn.room_id, &conn.player_game_id).await),
        })
    }

    /// Free-text submission: bounded by text lives, speed bonus for
    /// correct answers by arrival rank among text-correct responders
    pub async fn submit_text(
        &self,
        connection_id: &ConnectionId,
        text: &str,
    ) -> Result<ServerMessage, EngineError> {
        let conn = self
            .connection(connection_id)
            .await
            .ok_or(EngineError::NotInRoom)?;
        let key = textmatch::normalize(text);
        if key.is_empty() {
            return Err(EngineError::EmptyAnswer);
        }

        let snap = self.round_snapshot(&conn.room_id).await?;
        let question = self
            .repo
            .get_question(&snap.question_id)
            .await
            .ok_or(EngineError::NoQuestion)?;
        let matched = textmatch::is_match(&key, &question.accepted);

        enum TextResult {
            Correct { points: u32, response_ms: u64 },
            WrongTerminal { response_ms: u64 },
            WrongRetry { lives_left: u32 },
        }

        let result = {
            let mut live = self.live.write().await;
            let lg = live.get_mut(&conn.room_id).ok_or(EngineError::RoundOver)?;
            if lg.round_uid != snap.uid || Self::now_ms() >= lg.ends_at_ms {
                return Err(EngineError::RoundOver);
            }
            if lg.answered.contains(&conn.player_game_id) {
                return Err(EngineError::AlreadyAnswered);
            }
            let attempts = lg.attempts.entry(conn.player_game_id.clone()).or_insert(0);
            if *attempts >= self.cfg.text_lives {
                return Err(EngineError::NoLives);
            }

            if matched {
                let rank = lg.text_correct;
                lg.text_correct += 1;
                let field = lg.eligible.len();
                lg.answered.insert(conn.player_game_id.clone());
                lg.arrival.push(conn.player_game_id.clone());
                TextResult::Correct {
                    points: self.cfg.text_points
                        + speed_bonus(self.cfg.text_speed_bonus_max, rank, field),
                    response_ms: Self::now_ms().saturating_sub(lg.round_start_ms),
                }
            } else {
                *attempts += 1;
                if *attempts >= self.cfg.text_lives {
                    lg.answered.insert(conn.player_game_id.clone());
                    lg.arrival.push(conn.player_game_id.clone());
                    TextResult::WrongTerminal {
                        response_ms: Self::now_ms().saturating_sub(lg.round_start_ms),
                    }
                } else {
                    TextResult::WrongRetry {
                        lives_left: self.cfg.text_lives - *attempts,
                    }
                }
            }
        };

        match result {
            TextResult::Correct { points, response_ms } => {
                self.finalize_submission(
                    &conn.room_id,
                    ScoredSubmission {
                        player_game_id: conn.player_game_id.clone(),
                        question_id: question.id.clone(),
                        mode: AnswerMode::Text,
                        correct: true,
                        points,
                        response_ms,
                    },
                )
                .await;
                let truth = question.correct_choice();
                Ok(ServerMessage::AnswerFeedback {
                    correct: true,
                    correct_choice_id: truth.map(|c| c.id.clone()),
                    correct_label: truth.map(|c| c.label.clone()),
                    response_ms,
                    lives_left: self.cfg.text_lives,
                })
            }
            TextResult::WrongTerminal { response_ms } => {
                self.finalize_submission(
                    &conn.room_id,
                    ScoredSubmission {
                        player_game_id: conn.player_game_id.clone(),
                        question_id: question.id.clone(),
                        mode: AnswerMode::Text,
                        correct: false,
                        points: 0,
                        response_ms,
                    },
                )
                .await;
                // Out of lives: the truth may now be revealed
                let truth = question.correct_choice();
                Ok(ServerMessage::AnswerFeedback {
                    correct: false,
                    correct_choice_id: truth.map(|c| c.id.clone()),
                    correct_label: truth.map(|c| c.label.clone()),
                    response_ms,
                    lives_left: 0,
                })
            }
            TextResult::WrongRetry { lives_left } => {
                // Not terminal: withhold the answer, let them keep guessing
                Ok(ServerMessage::AnswerFeedback {
                    correct: false,
                    correct_choice_id: None,
                    correct_label: None,
                    response_ms: 0,
                    lives_left,
                })
            }
        }
    }

    /// Commit a scheduled bot decision. Silently discards itself when
    /// the round moved on, expired, or the bot already answered.
    pub(crate) async fn apply_bot_answer(
        &self,
        room_id: &RoomId,
        uid: u64,
        player_game_id: &PlayerGameId,
        outcome: BotOutcome,
    ) {
        let committed = {
            let mut live = self.live.write().await;
            let Some(lg) = live.get_mut(room_id) else {
                tracing::debug!(room = %room_id, uid, "bot answer after room drain discarded");
                return;
            };
            if lg.round_uid != uid
                || Self::now_ms() >= lg.ends_at_ms
                || lg.answered.contains(player_game_id)
            {
                tracing::debug!(room = %room_id, uid, "stale bot answer discarded");
                return;
            }
            let Some(question_id) = lg.current_question_id().cloned() else {
                return;
            };

            lg.answered.insert(player_game_id.clone());
            lg.arrival.push(player_game_id.clone());
            let response_ms = Self::now_ms().saturating_sub(lg.round_start_ms);

            let (mode, correct, points) = match outcome {
                BotOutcome::CorrectText => {
                    let rank = lg.text_correct;
                    lg.text_correct += 1;
                    let bonus = speed_bonus(self.cfg.text_speed_bonus_max, rank, lg.eligible.len());
                    (AnswerMode::Text, true, self.cfg.text_points + bonus)
                }
                BotOutcome::CorrectChoice => (AnswerMode::Choice, true, self.cfg.choice_points),
                BotOutcome::Wrong { via_text } => {
                    let mode = if via_text {
                        AnswerMode::Text
                    } else {
                        AnswerMode::Choice
                    };
                    (mode, false, 0)
                }
            };

            ScoredSubmission {
                player_game_id: player_game_id.clone(),
                question_id,
                mode,
                correct,
                points,
                response_ms,
            }
        };

        self.finalize_submission(room_id, committed).await;
    }

    /// Persist the scored outcome and notify the room. The round clock
    /// stays authoritative: a storage hiccup is logged, never blocking.
    async fn finalize_submission(&self, room_id: &RoomId, s: ScoredSubmission) {
        if s.points > 0 && self.repo.add_score(&s.player_game_id, s.points).await.is_none() {
            tracing::error!(player = %s.player_game_id, "score increment failed, round continues");
        }
        self.repo
            .adjust_energy(
                &s.player_game_id,
                i64::from(self.cfg.energy_regen),
                self.cfg.energy_max,
            )
            .await;
        self.repo
            .append_answer(Answer {
                id: ulid::Ulid::new().to_string(),
                player_game_id: s.player_game_id.clone(),
                question_id: s.question_id,
                mode: s.mode,
                correct: s.correct,
                response_ms: s.response_ms,
                ts: chrono::Utc::now().to_rfc3339(),
            })
            .await;

        self.broadcaster
            .broadcast(
                room_id,
                ServerMessage::PlayerAnswered {
                    player_game_id: s.player_game_id,
                    correct: s.correct,
                },
            )
            .await;
        self.broadcast_leaderboard(room_id).await;
    }

    async fn round_snapshot(&self, room_id: &RoomId) -> Result<RoundSnapshot, EngineError> {
        let live = self.live.read().await;
        let lg = live.get(room_id).ok_or(EngineError::NoQuestion)?;
        if Self::now_ms() >= lg.ends_at_ms {
            return Err(EngineError::RoundOver);
        }
        let question_id = lg.current_question_id().ok_or(EngineError::NoQuestion)?;
        Ok(RoundSnapshot {
            uid: lg.round_uid,
            question_id: question_id.clone(),
        })
    }

    async fn attempts_used(&self, room_id: &RoomId, player_game_id: &PlayerGameId) -> u32 {
        self.live
            .read()
            .await
            .get(room_id)
            .and_then(|lg| lg.attempts.get(player_game_id).copied())
            .unwrap_or(0)
    }
}
