//! WebSocket message dispatch
//!
//! Maps each client message onto an engine call, converts engine errors
//! into the protocol error shape, and tells the socket loop when its
//! room subscription should start or stop.

use crate::error::EngineError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{ConnectionId, RoomId};

/// What the socket loop should do after a message was handled
#[derive(Debug, Default)]
pub struct HandlerOutcome {
    /// Direct reply to the submitting connection
    pub reply: Option<ServerMessage>,
    /// Room whose broadcast channel the connection should join
    pub joined: Option<RoomId>,
    /// The connection left its room; drop the subscription
    pub left: bool,
}

impl HandlerOutcome {
    fn reply(msg: ServerMessage) -> Self {
        Self {
            reply: Some(msg),
            ..Self::default()
        }
    }

    fn error(e: EngineError) -> Self {
        Self::reply(ServerMessage::Error {
            code: e.code().to_string(),
            msg: e.to_string(),
        })
    }

    fn silent() -> Self {
        Self::default()
    }
}

pub async fn handle_message(
    state: &AppState,
    connection_id: &ConnectionId,
    msg: ClientMessage,
) -> HandlerOutcome {
    match msg {
        ClientMessage::CreateRoom {
            display_name,
            public,
            difficulty,
            question_count,
            banned_themes,
        } => {
            match state
                .create_room(
                    connection_id,
                    display_name,
                    public,
                    difficulty,
                    question_count,
                    banned_themes,
                )
                .await
            {
                Ok(welcome) => welcomed(welcome),
                Err(e) => HandlerOutcome::error(e),
            }
        }

        ClientMessage::JoinRoom {
            join_code,
            display_name,
        } => match state.join_room(connection_id, &join_code, display_name).await {
            Ok(welcome) => welcomed(welcome),
            Err(e) => HandlerOutcome::error(e),
        },

        ClientMessage::CloseRoom => match state.close_room(connection_id).await {
            Ok(()) => HandlerOutcome {
                left: true,
                ..HandlerOutcome::default()
            },
            Err(e) => HandlerOutcome::error(e),
        },

        ClientMessage::StartGame => {
            let Some(conn) = state.connection(connection_id).await else {
                return HandlerOutcome::error(EngineError::NotInRoom);
            };
            match state.start_game(&conn.room_id).await {
                // Round flow arrives over the room channel
                Ok(()) => HandlerOutcome::silent(),
                Err(e) => HandlerOutcome::error(e),
            }
        }

        ClientMessage::RevealChoices => match state.reveal_choices(connection_id).await {
            Ok(reply) => HandlerOutcome::reply(reply),
            Err(e) => HandlerOutcome::error(e),
        },

        ClientMessage::SubmitChoice { choice_id } => {
            match state.submit_choice(connection_id, &choice_id).await {
                Ok(reply) => HandlerOutcome::reply(reply),
                Err(e) => HandlerOutcome::error(e),
            }
        }

        ClientMessage::SubmitText { text } => {
            match state.submit_text(connection_id, &text).await {
                Ok(reply) => HandlerOutcome::reply(reply),
                Err(e) => HandlerOutcome::error(e),
            }
        }

        ClientMessage::LeaveRoom => {
            state.leave_room(connection_id).await;
            HandlerOutcome {
                left: true,
                ..HandlerOutcome::default()
            }
        }
    }
}

/// A welcome carries the room whose channel the socket must join
fn welcomed(welcome: ServerMessage) -> HandlerOutcome {
    let joined = match &welcome {
        ServerMessage::Welcome { room, .. } => Some(room.id.clone()),
        _ => None,
    };
    HandlerOutcome {
        reply: Some(welcome),
        joined,
        left: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn test_create_room_replies_welcome_and_joins() {
        let (state, _) = test_state();
        let outcome = handle_message(
            &state,
            &"c1".to_string(),
            ClientMessage::CreateRoom {
                display_name: "Ann".to_string(),
                public: false,
                difficulty: 5,
                question_count: 10,
                banned_themes: vec![],
            },
        )
        .await;

        assert!(matches!(outcome.reply, Some(ServerMessage::Welcome { .. })));
        assert!(outcome.joined.is_some());
        assert!(!outcome.left);
    }

    #[tokio::test]
    async fn test_submit_without_joining_is_rejected() {
        let (state, _) = test_state();
        let outcome = handle_message(
            &state,
            &"c1".to_string(),
            ClientMessage::SubmitText {
                text: "paris".to_string(),
            },
        )
        .await;

        let Some(ServerMessage::Error { code, .. }) = outcome.reply else {
            panic!("expected error reply");
        };
        assert_eq!(code, "NOT_IN_ROOM");
    }

    #[tokio::test]
    async fn test_start_game_without_questions_reports_shortage() {
        let (state, _) = test_state();
        handle_message(
            &state,
            &"c1".to_string(),
            ClientMessage::CreateRoom {
                display_name: "Ann".to_string(),
                public: false,
                difficulty: 5,
                question_count: 10,
                banned_themes: vec![],
            },
        )
        .await;

        let outcome = handle_message(&state, &"c1".to_string(), ClientMessage::StartGame).await;
        let Some(ServerMessage::Error { code, .. }) = outcome.reply else {
            panic!("expected error reply");
        };
        assert_eq!(code, "NO_QUESTIONS_AVAILABLE");
    }

    #[tokio::test]
    async fn test_leave_room_drops_the_subscription() {
        let (state, _) = test_state();
        handle_message(
            &state,
            &"c1".to_string(),
            ClientMessage::CreateRoom {
                display_name: "Ann".to_string(),
                public: false,
                difficulty: 5,
                question_count: 10,
                banned_themes: vec![],
            },
        )
        .await;

        let outcome = handle_message(&state, &"c1".to_string(), ClientMessage::LeaveRoom).await;
        assert!(outcome.left);
        assert!(state.connection(&"c1".to_string()).await.is_none());
    }
}
