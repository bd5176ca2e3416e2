//! End-to-end engine tests driving the public API the way the socket
//! layer does: create a room, join players, run rounds, score answers,
//! and let the timers advance the game.

use quizden::broadcast::{ChannelBroadcaster, RecordingBroadcaster};
use quizden::config::Config;
use quizden::error::EngineError;
use quizden::protocol::ServerMessage;
use quizden::state::AppState;
use quizden::types::*;
use std::sync::Arc;
use std::time::Duration;

fn recording_state(cfg: Config) -> (AppState, Arc<RecordingBroadcaster>) {
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    (AppState::new(cfg, broadcaster.clone()), broadcaster)
}

fn test_config() -> Config {
    Config {
        rng_seed: Some(7),
        round_ms: 10_000,
        ..Config::default()
    }
}

fn question(id: &str, theme: &str, bucket: u8, answer: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        theme: theme.to_string(),
        difficulty: bucket,
        image_url: None,
        choices: vec![
            Choice {
                id: format!("{id}-a"),
                label: answer.to_string(),
                is_correct: true,
            },
            Choice {
                id: format!("{id}-b"),
                label: "Decoy".to_string(),
                is_correct: false,
            },
            Choice {
                id: format!("{id}-c"),
                label: "Other".to_string(),
                is_correct: false,
            },
        ],
        accepted: vec![answer.to_lowercase()],
    }
}

async fn seed_questions(state: &AppState, count: usize) {
    for i in 0..count {
        state
            .repo
            .insert_question(question(&format!("q{i}"), "misc", 1, "Paris"))
            .await;
    }
}

async fn create_room_with(
    state: &AppState,
    conn: &str,
    name: &str,
    questions: usize,
) -> (RoomId, PlayerGameId) {
    let msg = state
        .create_room(&conn.to_string(), name.to_string(), false, 1, questions, vec![])
        .await
        .unwrap();
    let ServerMessage::Welcome {
        room,
        player_game_id,
        ..
    } = msg
    else {
        panic!("expected welcome");
    };
    (room.id, player_game_id)
}

async fn join(state: &AppState, conn: &str, code: &str, name: &str) -> PlayerGameId {
    let msg = state
        .join_room(&conn.to_string(), code, Some(name.to_string()))
        .await
        .unwrap();
    let ServerMessage::Welcome { player_game_id, .. } = msg else {
        panic!("expected welcome");
    };
    player_game_id
}

async fn current_question(state: &AppState, room_id: &RoomId) -> (u64, QuestionId) {
    let live = state.live.read().await;
    let lg = live.get(room_id).unwrap();
    (lg.round_uid, lg.current_question_id().unwrap().clone())
}

#[tokio::test]
async fn test_two_players_scored_and_ranked() {
    let (state, _) = recording_state(test_config());
    seed_questions(&state, 5).await;

    let (room_id, ann_pg) = create_room_with(&state, "c-ann", "Ann", 3).await;
    let code = state.repo.get_room(&room_id).await.unwrap().join_code;
    let bob_pg = join(&state, "c-bob", &code, "Bob").await;

    state.start_game(&room_id).await.unwrap();
    let (_, qid) = current_question(&state, &room_id).await;

    // Ann takes the free-text path, Bob the multiple-choice path
    let msg = state.submit_text(&"c-ann".to_string(), "paris").await.unwrap();
    assert!(matches!(
        msg,
        ServerMessage::AnswerFeedback { correct: true, .. }
    ));
    let msg = state
        .submit_choice(&"c-bob".to_string(), &format!("{qid}-a"))
        .await
        .unwrap();
    assert!(matches!(
        msg,
        ServerMessage::AnswerFeedback { correct: true, .. }
    ));

    let cfg = &state.cfg;
    let ann = state.repo.get_player_game(&ann_pg).await.unwrap();
    let bob = state.repo.get_player_game(&bob_pg).await.unwrap();
    // Text with the first-arrival bonus outscores a choice answer
    assert_eq!(ann.score, cfg.text_points + cfg.text_speed_bonus_max);
    assert_eq!(bob.score, cfg.choice_points);

    let board = state.build_leaderboard(&room_id).await;
    assert_eq!(board[0].player_game_id, ann_pg);
    assert_eq!(board[0].answered_rank, Some(0));
    assert_eq!(board[1].player_game_id, bob_pg);
    assert_eq!(board[1].answered_rank, Some(1));
}

#[tokio::test]
async fn test_manual_round_progression_to_final_leaderboard() {
    let (state, broadcaster) = recording_state(test_config());
    seed_questions(&state, 5).await;
    let (room_id, ann_pg) = create_room_with(&state, "c-ann", "Ann", 2).await;

    state.start_game(&room_id).await.unwrap();

    // Round 0: answer, then force the round end with the current stamp
    state.submit_text(&"c-ann".to_string(), "paris").await.unwrap();
    let (uid, _) = current_question(&state, &room_id).await;
    state.end_round_if_current(&room_id, uid).await;

    // The gap timer is armed with the old stamp; advance manually so the
    // test controls timing. A stale manual start is harmless because the
    // gap timer revalidates before it fires.
    state.start_round(&room_id, 1).await;
    state.submit_text(&"c-ann".to_string(), "paris").await.unwrap();
    let (uid, _) = current_question(&state, &room_id).await;
    state.end_round_if_current(&room_id, uid).await;

    // Game over: final board broadcast, live state gone, score carried
    let msgs = broadcaster.messages_for(&room_id).await;
    let final_board = msgs.iter().find_map(|m| match m {
        ServerMessage::FinalLeaderboard { leaderboard, .. } => Some(leaderboard.clone()),
        _ => None,
    });
    let final_board = final_board.expect("final leaderboard broadcast");
    assert_eq!(final_board[0].player_game_id, ann_pg);
    assert!(final_board[0].score >= 2 * state.cfg.text_points);
    assert!(state.live.read().await.get(&room_id).is_none());

    // The next game exists in lobby with a fresh participation record
    let next = state.current_game_id(&room_id).await.unwrap();
    let conns = state.room_connections(&room_id).await;
    assert_eq!(conns[0].game_id, next);
    assert_ne!(conns[0].player_game_id, ann_pg);
}

#[tokio::test]
async fn test_round_timers_drive_a_short_game() {
    let cfg = Config {
        rng_seed: Some(11),
        round_ms: 150,
        round_gap_ms: 50,
        final_board_ms: 60_000,
        ..Config::default()
    };
    let (state, broadcaster) = recording_state(cfg);
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 2).await;

    state.start_game(&room_id).await.unwrap();

    // Both rounds and the gap fit well inside this window
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let msgs = broadcaster.messages_for(&room_id).await;
    let begins = msgs
        .iter()
        .filter(|m| matches!(m, ServerMessage::RoundBegin { .. }))
        .count();
    let ends = msgs
        .iter()
        .filter(|m| matches!(m, ServerMessage::RoundEnd { .. }))
        .count();
    assert_eq!(begins, 2);
    assert_eq!(ends, 2);
    assert!(msgs
        .iter()
        .any(|m| matches!(m, ServerMessage::FinalLeaderboard { .. })));
    assert!(state.live.read().await.get(&room_id).is_none());
}

#[tokio::test]
async fn test_late_answer_is_rejected_after_round_end() {
    let (state, _) = recording_state(test_config());
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 2).await;
    state.start_game(&room_id).await.unwrap();

    let (uid, qid) = current_question(&state, &room_id).await;
    state.end_round_if_current(&room_id, uid).await;

    // The submission window closed with the round; the gap before the
    // next round accepts nothing
    assert_eq!(
        state
            .submit_choice(&"c-ann".to_string(), &format!("{qid}-b"))
            .await
            .unwrap_err(),
        EngineError::RoundOver
    );
    assert_eq!(
        state
            .submit_text(&"c-ann".to_string(), "paris")
            .await
            .unwrap_err(),
        EngineError::RoundOver
    );
}

#[tokio::test]
async fn test_leaving_last_human_stops_the_game() {
    let (state, broadcaster) = recording_state(test_config());
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 3).await;
    state.start_game(&room_id).await.unwrap();
    assert!(state.live.read().await.get(&room_id).is_some());

    state.leave_room(&"c-ann".to_string()).await;

    assert!(state.live.read().await.get(&room_id).is_none());
    let msgs = broadcaster.messages_for(&room_id).await;
    assert!(msgs.iter().any(|m| matches!(m, ServerMessage::GameStopped)));

    // The stale round timer fires later and must not resurrect anything
    let game_id = state.current_game_id(&room_id).await.unwrap();
    assert_eq!(
        state.repo.get_game(&game_id).await.unwrap().status,
        GameStatus::Lobby
    );
}

#[tokio::test]
async fn test_bots_play_alongside_humans() {
    let (state, _) = recording_state(test_config());
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 3).await;

    for bot in quizden::bots::default_catalog().into_iter().take(2) {
        state.repo.insert_bot(bot.clone()).await;
        state.attach_bot(&room_id, &bot).await;
    }
    state.start_game(&room_id).await.unwrap();

    // Bots are eligible scorers from round 0
    let live = state.live.read().await;
    let lg = live.get(&room_id).unwrap();
    assert_eq!(lg.eligible.len(), 3);
    drop(live);

    let board = state.build_leaderboard(&room_id).await;
    assert_eq!(board.len(), 3);
}

#[tokio::test]
async fn test_channel_broadcaster_delivers_to_subscribers() {
    let state = AppState::new(test_config(), Arc::new(ChannelBroadcaster::new()));
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 3).await;

    let mut rx = state.broadcaster.subscribe(&room_id).await;
    state.start_game(&room_id).await.unwrap();

    let mut saw_round_begin = false;
    while let Ok(Ok(msg)) =
        tokio::time::timeout(Duration::from_millis(200), rx.recv()).await
    {
        if matches!(msg, ServerMessage::RoundBegin { .. }) {
            saw_round_begin = true;
            break;
        }
    }
    assert!(saw_round_begin);
}

#[tokio::test]
async fn test_closed_room_rejects_everything() {
    let (state, _) = recording_state(test_config());
    seed_questions(&state, 5).await;
    let (room_id, _) = create_room_with(&state, "c-ann", "Ann", 3).await;
    let code = state.repo.get_room(&room_id).await.unwrap().join_code;

    state.close_room(&"c-ann".to_string()).await.unwrap();

    assert_eq!(
        state
            .join_room(&"c-bob".to_string(), &code, None)
            .await
            .unwrap_err(),
        EngineError::RoomClosed
    );
    assert_eq!(
        state.start_game(&room_id).await.unwrap_err(),
        EngineError::RoomClosed
    );
}
