//! Recipe Gateway
//!
//! HTTP service that sits between the mobile app and the generative model.
//! It keeps the upstream API key server-side, limits how often each client
//! may call the model, and logs every generation request for analytics.
//!
//! ## Endpoints
//!
//! Every route is served both at the root and under `/api`.
//!
//! - `POST /analyze-ingredients` - Extract ingredients from 1 to 3 photos
//! - `POST /generate-recipe` - Generate a recipe in one response
//! - `POST /stream-recipe` - Generate a recipe as a chunked text stream
//! - `GET /analytics?period=24h` - Aggregate request statistics
//! - `GET /health` - Health check
//! - `GET /` - API index

pub mod analytics;
pub mod config;
pub mod error;
pub mod gemini;
pub mod handlers;
pub mod model;
pub mod rate_limiter;
pub mod relay;
pub mod report;
pub mod sse;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use analytics::{AnalyticsLogger, AnalyticsStore};
use model::GenerativeModel;
use rate_limiter::RateLimiter;

/// Default JSON body limit, large enough for three photos
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers
pub struct AppState {
    /// Upstream generative model
    pub model: Arc<dyn GenerativeModel>,

    /// Analytics store, read by the analytics endpoint
    pub store: Arc<dyn AnalyticsStore>,

    /// Background writer in front of `store`
    pub analytics: AnalyticsLogger,

    /// Per-client admission control for generation endpoints
    pub rate_limiter: RateLimiter,

    pub max_body_bytes: usize,
}

impl AppState {
    /// Create new application state
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        store: Arc<dyn AnalyticsStore>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            model,
            analytics: AnalyticsLogger::new(Arc::clone(&store)),
            store,
            rate_limiter,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

type SharedState = Arc<AppState>;

/// OPTIONS answers 200, any other unrouted method gets a JSON 405
fn with_defaults(route: MethodRouter<SharedState>) -> MethodRouter<SharedState> {
    route
        .options(handlers::preflight_handler)
        .fallback(handlers::method_not_allowed_handler)
}

fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", with_defaults(get(handlers::index_handler)))
        .route("/health", with_defaults(get(handlers::health_handler)))
        .route(
            "/analyze-ingredients",
            with_defaults(post(handlers::analyze_ingredients_handler)),
        )
        .route(
            "/generate-recipe",
            with_defaults(post(handlers::generate_recipe_handler)),
        )
        .route(
            "/stream-recipe",
            with_defaults(post(handlers::stream_recipe_handler)),
        )
        .route("/analytics", with_defaults(get(handlers::analytics_handler)))
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    let state = Arc::new(state);

    Router::new()
        .merge(api_routes())
        // The mobile client calls everything under /api
        .nest("/api", api_routes())
        .fallback(handlers::not_found_handler)
        // Middleware
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
