//! Ballotbox application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build the session manager and user directory
//! 4. Build router with API routes, tracing and cache headers
//! 5. Start Axum server

use ballotbox::{
    auth::{AppState, SessionManager, TokenCodec},
    config::Config,
    routes,
    storage::{KvStore, KvUserDirectory, RedisStore},
};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting ballotbox on {}", config.bind_addr);

    // Connect to Redis
    let redis_client = redis::Client::open(config.redis_url.as_str()).expect("Invalid Redis URL");
    let store: Arc<dyn KvStore> = Arc::new(
        RedisStore::connect(redis_client)
            .await
            .expect("Failed to connect to Redis"),
    );

    // Build shared state
    let codec = TokenCodec::new(config.jwt_secret.as_bytes());
    let state = AppState {
        sessions: Arc::new(SessionManager::new(
            codec,
            store.clone(),
            config.session_settings(),
        )),
        users: Arc::new(KvUserDirectory::new(store)),
    };

    let app = routes::app(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
