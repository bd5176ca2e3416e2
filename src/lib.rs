// Public API for integration tests and potential library usage

pub mod bots;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod protocol;
pub mod repo;
pub mod shuffle;
pub mod state;
pub mod textmatch;
pub mod types;
pub mod ws;
