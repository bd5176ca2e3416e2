//! In-process persistence repository
//!
//! The minimal storage surface the engine consumes: rooms, games,
//! player-games (with atomic score increments), questions (bucketed
//! random sampling with theme exclusion), append-only answers, and the
//! bot catalog. Backed by in-memory maps; a database engine is out of
//! scope, the engine only ever talks to these methods.

use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct Repository {
    rooms: Arc<RwLock<HashMap<RoomId, Room>>>,
    games: Arc<RwLock<HashMap<GameId, Game>>>,
    player_games: Arc<RwLock<HashMap<PlayerGameId, PlayerGame>>>,
    questions: Arc<RwLock<HashMap<QuestionId, Question>>>,
    answers: Arc<RwLock<Vec<Answer>>>,
    bots: Arc<RwLock<HashMap<BotId, BotProfile>>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Rooms ==========

    pub async fn insert_room(&self, room: Room) {
        self.rooms.write().await.insert(room.id.clone(), room);
    }

    pub async fn get_room(&self, id: &RoomId) -> Option<Room> {
        self.rooms.read().await.get(id).cloned()
    }

    pub async fn get_room_by_code(&self, code: &str) -> Option<Room> {
        self.rooms
            .read()
            .await
            .values()
            .find(|r| r.join_code == code)
            .cloned()
    }

    pub async fn close_room(&self, id: &RoomId) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(id) {
            Some(room) => {
                room.status = RoomStatus::Closed;
                true
            }
            None => false,
        }
    }

    pub async fn open_public_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|r| r.public && r.status == RoomStatus::Open)
            .cloned()
            .collect();
        // Stable order so target apportionment is reproducible
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    // ========== Games ==========

    pub async fn create_game(&self, room_id: &RoomId) -> Game {
        let game = Game {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.clone(),
            status: GameStatus::Lobby,
            question_ids: Vec::new(),
        };
        self.games.write().await.insert(game.id.clone(), game.clone());
        game
    }

    pub async fn get_game(&self, id: &GameId) -> Option<Game> {
        self.games.read().await.get(id).cloned()
    }

    pub async fn set_game_status(&self, id: &GameId, status: GameStatus) {
        if let Some(game) = self.games.write().await.get_mut(id) {
            game.status = status;
        }
    }

    pub async fn set_game_questions(&self, id: &GameId, question_ids: Vec<QuestionId>) {
        if let Some(game) = self.games.write().await.get_mut(id) {
            game.question_ids = question_ids;
        }
    }

    // ========== Player-games ==========

    /// Create or return the participation record for (game, player)
    pub async fn upsert_player_game(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        display_name: &str,
        is_bot: bool,
        energy_max: u32,
    ) -> PlayerGame {
        let mut pgs = self.player_games.write().await;
        if let Some(existing) = pgs
            .values()
            .find(|pg| &pg.game_id == game_id && &pg.player_id == player_id)
        {
            return existing.clone();
        }
        let pg = PlayerGame {
            id: ulid::Ulid::new().to_string(),
            game_id: game_id.clone(),
            player_id: player_id.clone(),
            display_name: display_name.to_string(),
            is_bot,
            score: 0,
            energy: energy_max,
        };
        pgs.insert(pg.id.clone(), pg.clone());
        pg
    }

    pub async fn get_player_game(&self, id: &PlayerGameId) -> Option<PlayerGame> {
        self.player_games.read().await.get(id).cloned()
    }

    pub async fn player_games(&self, ids: &[PlayerGameId]) -> Vec<PlayerGame> {
        let pgs = self.player_games.read().await;
        ids.iter().filter_map(|id| pgs.get(id).cloned()).collect()
    }

    /// Atomic read-modify-write score increment
    pub async fn add_score(&self, id: &PlayerGameId, delta: u32) -> Option<u32> {
        let mut pgs = self.player_games.write().await;
        let pg = pgs.get_mut(id)?;
        pg.score += delta;
        Some(pg.score)
    }

    /// Adjust energy by a signed delta, clamped to [0, cap].
    /// Returns None if the deduction would go below zero.
    pub async fn adjust_energy(&self, id: &PlayerGameId, delta: i64, cap: u32) -> Option<u32> {
        let mut pgs = self.player_games.write().await;
        let pg = pgs.get_mut(id)?;
        let next = i64::from(pg.energy) + delta;
        if next < 0 {
            return None;
        }
        pg.energy = (next as u32).min(cap);
        Some(pg.energy)
    }

    /// Zero scores and refill energy for a fresh game
    pub async fn reset_player_games(&self, ids: &[PlayerGameId], energy_max: u32) {
        let mut pgs = self.player_games.write().await;
        for id in ids {
            if let Some(pg) = pgs.get_mut(id) {
                pg.score = 0;
                pg.energy = energy_max;
            }
        }
    }

    // ========== Questions ==========

    pub async fn insert_question(&self, question: Question) {
        self.questions
            .write()
            .await
            .insert(question.id.clone(), question);
    }

    pub async fn get_question(&self, id: &QuestionId) -> Option<Question> {
        self.questions.read().await.get(id).cloned()
    }

    /// Random sample of up to `count` questions from one difficulty
    /// bucket, excluding banned themes and already-picked ids
    pub async fn sample_questions<R: Rng>(
        &self,
        bucket: Option<u8>,
        count: usize,
        banned_themes: &[String],
        exclude: &[QuestionId],
        rng: &mut R,
    ) -> Vec<Question> {
        let questions = self.questions.read().await;
        let mut pool: Vec<Question> = questions
            .values()
            .filter(|q| bucket.is_none_or(|b| q.difficulty == b))
            .filter(|q| !banned_themes.contains(&q.theme))
            .filter(|q| !exclude.contains(&q.id))
            .cloned()
            .collect();
        pool.shuffle(rng);
        pool.truncate(count);
        pool
    }

    // ========== Answers ==========

    pub async fn append_answer(&self, answer: Answer) {
        self.answers.write().await.push(answer);
    }

    pub async fn answers_for_player_game(&self, id: &PlayerGameId) -> Vec<Answer> {
        self.answers
            .read()
            .await
            .iter()
            .filter(|a| &a.player_game_id == id)
            .cloned()
            .collect()
    }

    // ========== Bots ==========

    pub async fn insert_bot(&self, bot: BotProfile) {
        self.bots.write().await.insert(bot.id.clone(), bot);
    }

    pub async fn get_bot(&self, id: &BotId) -> Option<BotProfile> {
        self.bots.read().await.get(id).cloned()
    }

    pub async fn all_bots(&self) -> Vec<BotProfile> {
        let mut bots: Vec<BotProfile> = self.bots.read().await.values().cloned().collect();
        bots.sort_by(|a, b| a.id.cmp(&b.id));
        bots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(id: &str, theme: &str, bucket: u8) -> Question {
        Question {
            id: id.to_string(),
            text: format!("q {id}"),
            theme: theme.to_string(),
            difficulty: bucket,
            image_url: None,
            choices: Vec::new(),
            accepted: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_player_game_is_idempotent() {
        let repo = Repository::new();
        let game = repo.create_game(&"r1".to_string()).await;
        let a = repo
            .upsert_player_game(&game.id, &"p1".to_string(), "Ann", false, 100)
            .await;
        let b = repo
            .upsert_player_game(&game.id, &"p1".to_string(), "Ann", false, 100)
            .await;
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_add_score_accumulates() {
        let repo = Repository::new();
        let game = repo.create_game(&"r1".to_string()).await;
        let pg = repo
            .upsert_player_game(&game.id, &"p1".to_string(), "Ann", false, 100)
            .await;
        repo.add_score(&pg.id, 50).await;
        repo.add_score(&pg.id, 30).await;
        assert_eq!(repo.get_player_game(&pg.id).await.unwrap().score, 80);
    }

    #[tokio::test]
    async fn test_adjust_energy_clamps_and_rejects_overdraft() {
        let repo = Repository::new();
        let game = repo.create_game(&"r1".to_string()).await;
        let pg = repo
            .upsert_player_game(&game.id, &"p1".to_string(), "Ann", false, 100)
            .await;

        assert_eq!(repo.adjust_energy(&pg.id, 50, 100).await, Some(100));
        assert_eq!(repo.adjust_energy(&pg.id, -30, 100).await, Some(70));
        assert_eq!(repo.adjust_energy(&pg.id, -200, 100).await, None);
    }

    #[tokio::test]
    async fn test_sample_questions_respects_bucket_and_bans() {
        let repo = Repository::new();
        repo.insert_question(question("q1", "history", 1)).await;
        repo.insert_question(question("q2", "sports", 1)).await;
        repo.insert_question(question("q3", "history", 2)).await;

        let mut rng = StdRng::seed_from_u64(7);
        let picked = repo
            .sample_questions(Some(1), 10, &["sports".to_string()], &[], &mut rng)
            .await;
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "q1");
    }

    #[tokio::test]
    async fn test_sample_questions_excludes_already_picked() {
        let repo = Repository::new();
        repo.insert_question(question("q1", "history", 1)).await;
        repo.insert_question(question("q2", "history", 1)).await;

        let mut rng = StdRng::seed_from_u64(7);
        let picked = repo
            .sample_questions(None, 10, &[], &["q1".to_string()], &mut rng)
            .await;
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "q2");
    }
}
