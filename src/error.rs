//! Engine error taxonomy
//!
//! Rejected submissions are reported to the submitting connection only;
//! a question shortage is broadcast room-wide. Stale timer callbacks are
//! not errors at all and never surface here.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("round is already over")]
    RoundOver,
    #[error("already answered this round")]
    AlreadyAnswered,
    #[error("no text lives remaining")]
    NoLives,
    #[error("unknown choice id")]
    UnknownChoice,
    #[error("empty answer")]
    EmptyAnswer,
    #[error("no live question")]
    NoQuestion,
    #[error("no questions available for this room")]
    NoQuestionsAvailable,
    #[error("room not found")]
    RoomNotFound,
    #[error("room is closed")]
    RoomClosed,
    #[error("game not found")]
    GameNotFound,
    #[error("not joined to a room")]
    NotInRoom,
    #[error("only the room owner can do that")]
    NotOwner,
    #[error("not enough energy")]
    NotEnoughEnergy,
}

impl EngineError {
    /// Stable protocol error code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RoundOver => "ROUND_OVER",
            EngineError::AlreadyAnswered => "ALREADY_ANSWERED",
            EngineError::NoLives => "NO_LIVES",
            EngineError::UnknownChoice => "UNKNOWN_CHOICE",
            EngineError::EmptyAnswer => "EMPTY_ANSWER",
            EngineError::NoQuestion => "NO_QUESTION",
            EngineError::NoQuestionsAvailable => "NO_QUESTIONS_AVAILABLE",
            EngineError::RoomNotFound => "ROOM_NOT_FOUND",
            EngineError::RoomClosed => "ROOM_CLOSED",
            EngineError::GameNotFound => "GAME_NOT_FOUND",
            EngineError::NotInRoom => "NOT_IN_ROOM",
            EngineError::NotOwner => "NOT_OWNER",
            EngineError::NotEnoughEnergy => "NOT_ENOUGH_ENERGY",
        }
    }
}
