use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        display_name: String,
        public: bool,
        difficulty: u8,
        question_count: usize,
        #[serde(default)]
        banned_themes: Vec<String>,
    },
    JoinRoom {
        join_code: String,
        #[serde(default)]
        display_name: Option<String>,
    },
    CloseRoom,
    StartGame,
    /// Ask for this viewer's shuffled multiple-choice labels
    RevealChoices,
    SubmitChoice {
        choice_id: ChoiceId,
    },
    SubmitText {
        text: String,
    },
    LeaveRoom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        room: Room,
        game_id: GameId,
        player_game_id: PlayerGameId,
        display_name: String,
        server_now: String,
    },
    LobbyUpdate {
        players: Vec<LobbyPlayer>,
    },
    RoundBegin {
        index: usize,
        total: usize,
        ends_at_ms: u64,
        question: MaskedQuestion,
        text_lives: u32,
    },
    /// Shuffled, label-only choices for the requesting viewer
    MultipleChoice {
        choices: Vec<MaskedChoice>,
        energy: u32,
    },
    /// Personal correctness callback for the submitting connection
    AnswerFeedback {
        correct: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        correct_choice_id: Option<ChoiceId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        correct_label: Option<String>,
        response_ms: u64,
        lives_left: u32,
    },
    /// Room-wide note that someone answered; never reveals the answer
    PlayerAnswered {
        player_game_id: PlayerGameId,
        correct: bool,
    },
    LeaderboardUpdate {
        leaderboard: Vec<LeaderboardRow>,
    },
    RoundEnd {
        index: usize,
        correct_choice_id: ChoiceId,
        correct_label: String,
        leaderboard: Vec<LeaderboardRow>,
    },
    FinalLeaderboard {
        leaderboard: Vec<LeaderboardRow>,
        display_ms: u64,
    },
    GameStopped,
    Error {
        code: String,
        msg: String,
    },
}

/// Lobby roster entry (humans and bots alike)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayer {
    pub player_game_id: PlayerGameId,
    pub display_name: String,
    pub is_bot: bool,
}

/// Question as broadcast to players: no correctness, no accepted answers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskedQuestion {
    pub id: QuestionId,
    pub text: String,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&Question> for MaskedQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            theme: q.theme.clone(),
            image_url: q.image_url.clone(),
        }
    }
}

/// Choice as shown to a viewer: label only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskedChoice {
    pub id: ChoiceId,
    pub label: String,
}

impl From<&Choice> for MaskedChoice {
    fn from(c: &Choice) -> Self {
        Self {
            id: c.id.clone(),
            label: c.label.clone(),
        }
    }
}
