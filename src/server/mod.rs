// Query server module
// Serves the search form and answers JSON search requests

#[cfg(test)]
mod tests;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::search::{SearchEngine, SearchError, SearchResponse};
use crate::{Result, StoryError};

/// Search form served at the root, with no external assets
const INDEX_PAGE: &str = include_str!("index.html");

/// Shared state handed to every request handler
pub struct AppState {
    engine: SearchEngine,
}

impl AppState {
    /// Wrap a search engine for use as router state
    #[inline]
    pub fn new(engine: SearchEngine) -> Self {
        Self { engine }
    }
}

/// Body of a `POST /search` request
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Request failures mapped onto HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is invalid
    #[error("{0}")]
    BadRequest(String),
    /// An upstream model service failed
    #[error("{0}")]
    Upstream(String),
    /// The vector store failed
    #[error("{0}")]
    Internal(String),
}

impl From<SearchError> for ApiError {
    #[inline]
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::EmptyQuery => Self::BadRequest(error.to_string()),
            SearchError::Embedding(_) | SearchError::Explanation(_) => {
                Self::Upstream(error.to_string())
            }
            SearchError::Store(_) => Self::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the application router
///
/// # Arguments
/// * `state` - Shared search engine state
///
/// # Returns
/// * `Router` - Router with the page, search, and health routes mounted
#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/search", post(search))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// Answer a search request with ranked stories and an explanation.
///
/// The engine never mutates the store, so a failed request leaves the
/// indexed stories exactly as they were.
async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> std::result::Result<Json<SearchResponse>, ApiError> {
    let response = state.engine.search(&request.query).await?;

    info!(
        "Answered query with {} stories",
        response.results.len()
    );

    Ok(Json(response))
}

async fn health(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let stories = state.engine.story_count().await?;
    Ok(Json(json!({ "status": "ok", "stories": stories })))
}

/// Start the query server and block until it is shut down.
///
/// Refuses to start while the store holds no stories, pointing the
/// operator at the indexing step instead.
///
/// # Arguments
/// * `config` - Application configuration carrying the bind address
///
/// # Returns
/// * `Result<()>` - Runs until interrupted, or the startup error
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let engine = SearchEngine::new(config.clone())
        .await
        .map_err(|e| StoryError::Server(format!("Failed to initialize search engine: {}", e)))?;

    let stories = engine
        .story_count()
        .await
        .map_err(|e| StoryError::Server(format!("Failed to open vector store: {}", e)))?;
    if stories == 0 {
        return Err(StoryError::Server(
            "No stories indexed yet. Run `story-search index` first.".to_string(),
        ));
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| StoryError::Server(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    info!("Serving {} stories on http://{}", stories, bind_addr);

    let state = Arc::new(AppState::new(engine));
    axum::serve(listener, router(state))
        .await
        .map_err(|e| StoryError::Server(format!("Server error: {}", e)))?;

    Ok(())
}
