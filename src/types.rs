use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type GameId = String;
pub type PlayerId = String;
pub type PlayerGameId = String;
pub type QuestionId = String;
pub type ChoiceId = String;
pub type AnswerId = String;
pub type ConnectionId = String;
pub type BotId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Lobby,
    Running,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub join_code: String,
    pub public: bool,
    /// Room difficulty 1-10, drives the question bucket distribution
    pub difficulty: u8,
    pub banned_themes: Vec<String>,
    pub question_count: usize,
    pub round_ms: u64,
    pub status: RoomStatus,
    pub owner_id: PlayerId,
    /// Relative share of the global bot population this room attracts
    pub traffic_weight: f64,
}

/// One play-through of a room. A room always has at most one non-ended
/// game; the next game is pre-created as soon as the previous one ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub room_id: RoomId,
    pub status: GameStatus,
    /// Ordered question selection, filled when the game starts
    pub question_ids: Vec<QuestionId>,
}

/// A player's participation record within one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerGame {
    pub id: PlayerGameId,
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub display_name: String,
    pub is_bot: bool,
    /// Monotonically non-decreasing within a game
    pub score: u32,
    /// Resource spent to reveal multiple-choice options, regained on answering
    pub energy: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub theme: String,
    /// Difficulty bucket 1-4
    pub difficulty: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Exactly one choice is marked correct
    pub choices: Vec<Choice>,
    /// Pre-normalized accepted free-text answers
    pub accepted: Vec<String>,
}

impl Question {
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.is_correct)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Text,
    Choice,
}

/// Immutable record of one scored submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub player_game_id: PlayerGameId,
    pub question_id: QuestionId,
    pub mode: AnswerMode,
    pub correct: bool,
    pub response_ms: u64,
    pub ts: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => DayPart::Morning,
            12..=17 => DayPart::Afternoon,
            18..=23 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }
}

/// An artificial player. Read-only during a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotProfile {
    pub id: BotId,
    pub name: String,
    /// Responsiveness 0-100; faster bots answer earlier
    pub speed: u8,
    /// Per-theme skill 0-100, "misc" acts as the fallback
    pub skills: HashMap<String, u8>,
    /// Per-daypart availability weight in [0,1]
    pub availability: HashMap<DayPart, f64>,
}

impl BotProfile {
    pub fn skill_for(&self, theme: &str) -> u8 {
        self.skills
            .get(theme)
            .or_else(|| self.skills.get("misc"))
            .copied()
            .unwrap_or(50)
    }

    pub fn availability_for(&self, part: DayPart) -> f64 {
        self.availability.get(&part).copied().unwrap_or(0.5)
    }
}

/// Transport-level handle mapping a connection to its room context.
/// Bots get synthetic entries so the registry is the single roster source.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub player_id: PlayerId,
    pub player_game_id: PlayerGameId,
    pub game_id: GameId,
    pub room_id: RoomId,
    pub display_name: String,
    pub is_bot: bool,
}

/// One row of a built leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardRow {
    pub player_game_id: PlayerGameId,
    pub display_name: String,
    pub score: u32,
    /// Arrival rank within the current round, None if not yet answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_rank: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daypart_from_hour() {
        assert_eq!(DayPart::from_hour(7), DayPart::Morning);
        assert_eq!(DayPart::from_hour(13), DayPart::Afternoon);
        assert_eq!(DayPart::from_hour(21), DayPart::Evening);
        assert_eq!(DayPart::from_hour(3), DayPart::Night);
    }

    #[test]
    fn test_skill_fallback_to_misc() {
        let mut skills = HashMap::new();
        skills.insert("history".to_string(), 80u8);
        skills.insert("misc".to_string(), 40u8);
        let bot = BotProfile {
            id: "b1".to_string(),
            name: "Nora".to_string(),
            speed: 50,
            skills,
            availability: HashMap::new(),
        };

        assert_eq!(bot.skill_for("history"), 80);
        assert_eq!(bot.skill_for("geography"), 40);
    }
}
