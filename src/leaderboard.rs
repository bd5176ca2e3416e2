//! Leaderboard construction
//!
//! Pure read-then-sort over a score snapshot. Ties on score break on
//! answer arrival within the current round (unanswered last), then on
//! display name so the full order is total and stable across rebuilds.

use crate::types::{LeaderboardRow, PlayerGame, PlayerGameId};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Build the ordered leaderboard for a set of player-games.
/// `arrival` maps player-game ids to their answer arrival rank in the
/// current round; pass an empty map outside a round.
pub fn build(players: &[PlayerGame], arrival: &HashMap<PlayerGameId, usize>) -> Vec<LeaderboardRow> {
    let mut rows: Vec<LeaderboardRow> = players
        .iter()
        .map(|pg| LeaderboardRow {
            player_game_id: pg.id.clone(),
            display_name: pg.display_name.clone(),
            score: pg.score,
            answered_rank: arrival.get(&pg.id).copied(),
        })
        .collect();

    // Score desc, then arrival (unanswered after any answered), then the
    // case-folded name. The key is built once per row, not per comparison.
    rows.sort_by_cached_key(|r| {
        (
            Reverse(r.score),
            r.answered_rank.is_none(),
            r.answered_rank.unwrap_or(0),
            r.display_name.to_lowercase(),
        )
    });
    rows
}
