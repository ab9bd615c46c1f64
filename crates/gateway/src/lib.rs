//! HTTP API gateway for Counsel.
//!
//! Exposes the REST API: login, chats, messages (the reply endpoint),
//! document upload, scenarios, and limits.
//!
//! Built on Axum. Security layers applied:
//! - Bearer token authentication on everything except `/health` and
//!   `/auth/login`
//! - In-memory sliding-window rate limiting (`limits.max_requests_per_min`)
//! - Request body size limit from `limits.max_file_size_bytes`
//! - CORS
//! - HTTP trace logging

pub mod api;
pub mod auth;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use counsel_chat::ReplyService;
use counsel_config::AppConfig;
use counsel_core::{
    ChatStore, DocumentStore, DocumentTextSource, Limits, MessageStore, UserStore,
};
use counsel_providers::{build_generator, WebSearchEnricher};
use counsel_storage::SqliteStore;

use auth::{AuthedUser, TokenSigner};

/// Shared application state for the gateway.
pub struct AppState {
    pub limits: Limits,
    pub users: Arc<dyn UserStore>,
    pub chats: Arc<dyn ChatStore>,
    pub messages: Arc<dyn MessageStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub document_texts: Arc<dyn DocumentTextSource>,
    pub reply: Arc<ReplyService>,
    pub tokens: TokenSigner,
}

pub type SharedState = Arc<AppState>;

/// Build the full router with all middleware layers.
pub fn build_router(state: SharedState) -> Router {
    let public = Router::new()
        .route("/health", get(api::health_handler))
        .route("/auth/login", post(api::login_handler));

    let protected = Router::new()
        .route("/chats", get(api::list_chats_handler))
        .route("/chats", post(api::create_chat_handler))
        .route("/chats/{chat_id}/messages", get(api::list_messages_handler))
        .route("/chats/{chat_id}/messages", post(api::send_message_handler))
        .route("/documents", post(api::upload_document_handler))
        .route("/documents", get(api::list_documents_handler))
        .route("/documents/{id}", get(api::get_document_handler))
        .route("/scenarios", get(api::scenarios_handler))
        .route("/config/limits", get(api::limits_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let rate_limiter = Arc::new(RateLimiter::new(
        state.limits.max_requests_per_min,
        Duration::from_secs(60),
    ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.limits.max_file_size_bytes))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Opens the configured database, selects the generation backend, wires the
/// reply service, and serves until ctrl-c.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let secret = config.auth.secret.clone().ok_or(
        "auth.secret is not configured — set it in counsel.toml or via COUNSEL_AUTH_SECRET",
    )?;

    let state = build_app_state(&config, &secret).await?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(addr = %addr, "Gateway starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

async fn build_app_state(
    config: &AppConfig,
    secret: &str,
) -> Result<SharedState, Box<dyn std::error::Error>> {
    if config.database.url.starts_with("postgres") {
        #[cfg(feature = "postgres")]
        {
            let store = Arc::new(
                counsel_storage::PostgresStore::connect(
                    &config.database.url,
                    config.database.max_connections,
                )
                .await?,
            );
            return Ok(assemble_state(store, config, secret));
        }
        #[cfg(not(feature = "postgres"))]
        return Err("postgres support is not compiled in — rebuild with --features postgres".into());
    }

    let store = Arc::new(SqliteStore::new(&config.database.url).await?);
    Ok(assemble_state(store, config, secret))
}

/// Wire one concrete store into the shared state.
pub fn assemble_state<S>(store: Arc<S>, config: &AppConfig, secret: &str) -> SharedState
where
    S: ChatStore + MessageStore + UserStore + DocumentStore + DocumentTextSource + 'static,
{
    let generator = build_generator(&config.llm, config.limits.max_output_tokens);

    // Probe the backend in the background; an unreachable backend is worth
    // a warning at startup but must not block serving.
    {
        let generator = generator.clone();
        tokio::spawn(async move {
            match generator.health_check().await {
                Ok(true) => info!(backend = generator.name(), "Generation backend reachable"),
                Ok(false) => warn!(backend = generator.name(), "Generation backend unhealthy"),
                Err(e) => {
                    warn!(backend = generator.name(), error = %e, "Generation backend unreachable")
                }
            }
        });
    }

    let mut reply = ReplyService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        generator,
        config.limits,
    )
    .with_timeout(Duration::from_secs(config.llm.timeout_secs));

    if config.llm.enable_web_search {
        reply = reply.with_enricher(Arc::new(WebSearchEnricher::new()));
    }

    Arc::new(AppState {
        limits: config.limits,
        users: store.clone(),
        chats: store.clone(),
        messages: store.clone(),
        documents: store.clone(),
        document_texts: store,
        reply: Arc::new(reply),
        tokens: TokenSigner::new(secret, config.auth.token_ttl_hours),
    })
}

// --- Middleware ---

/// Authentication middleware for all protected routes.
///
/// Requires a valid `Authorization: Bearer <token>` header; the verified
/// user ID is inserted into request extensions as [`AuthedUser`].
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.and_then(|t| state.tokens.verify(t)) {
        Some(user_id) => {
            req.extensions_mut().insert(AuthedUser(user_id));
            Ok(next.run(req).await)
        }
        None => {
            warn!("Unauthorized request — missing or invalid bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (bearer token or "anonymous").
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if the map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate limiting middleware — keyed by Authorization header, 429 when
/// exceeded. `/health` is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}
