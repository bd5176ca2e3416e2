use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizden::{
    bots,
    broadcast::{self, ChannelBroadcaster},
    config::Config,
    state::AppState,
    types::Question,
    ws,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizden=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizden...");

    let cfg = Config::from_env();
    let port = cfg.port;
    let state = AppState::new(cfg, Arc::new(ChannelBroadcaster::new()));

    // Seed the bot roster
    for bot in bots::default_catalog() {
        state.repo.insert_bot(bot).await;
    }

    // Load the question bank from a JSON file, if configured
    if let Ok(path) = std::env::var("QUIZDEN_QUESTIONS") {
        match load_questions(&state, &path).await {
            Ok(n) => tracing::info!(path, count = n, "question bank loaded"),
            Err(e) => tracing::error!(path, "failed to load question bank: {}", e),
        }
    } else {
        tracing::warn!("QUIZDEN_QUESTIONS not set, starting with an empty question bank");
    }

    broadcast::spawn_bot_sweeper(Arc::new(state.clone()));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn load_questions(state: &AppState, path: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let questions: Vec<Question> = serde_json::from_str(&raw)?;
    let n = questions.len();
    for q in questions {
        state.repo.insert_question(q).await;
    }
    Ok(n)
}
