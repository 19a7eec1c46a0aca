//! API request handlers

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, FromRequestParts, OriginalUri, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use recipe_common::{GenerationLogRecord, Ingredient, RequestType};
use recipe_core::{
    extract_ingredients, extraction_prompt, ingredient_from_value, recipe_prompt, validate_batch,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};

use crate::error::{ApiError, GatewayError};
use crate::model::GenerationParams;
use crate::relay::relay;
use crate::report::{AnalyticsReport, Period};
use crate::AppState;

/// Photos accepted per analysis request
pub const MAX_IMAGES: usize = 3;

/// Fragments buffered between the relay task and the response body
const STREAM_BUFFER: usize = 16;

const ANALYZE_FAILED: &str = "Failed to analyze ingredients";
const GENERATE_FAILED: &str = "Failed to generate recipe";
const STREAM_FAILED: &str = "Streaming failed";
const ANALYTICS_FAILED: &str = "Failed to fetch analytics";

/// Best-effort identity of the caller, used as the rate-limit key
///
/// First `X-Forwarded-For` entry, else the peer address, else `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ClientId(ip.to_string()));
        }

        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientId(addr.ip().to_string()));
        }

        Ok(ClientId("unknown".to_string()))
    }
}

/// Request to analyze food photos
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 photos, optionally as data URIs
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub ingredients: Vec<Ingredient>,
    pub response_time: u64,
}

/// Request to generate a recipe, blocking or streamed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRequest {
    #[serde(default)]
    pub ingredients: Option<Vec<Value>>,

    #[serde(default, alias = "style")]
    pub style_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub success: bool,
    pub recipe: String,
    pub response_time: u64,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn admit(state: &AppState, client: &str) -> Result<(), ApiError> {
    if state.rate_limiter.admit(client) {
        Ok(())
    } else {
        warn!("Rate limit exceeded for {}", client);
        Err(ApiError::from_gateway("", &GatewayError::RateLimited))
    }
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text())
}

fn recipe_inputs(
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<(Vec<Ingredient>, String), ApiError> {
    let Json(request) = payload.map_err(invalid_body)?;

    let ingredients: Vec<Ingredient> = request
        .ingredients
        .unwrap_or_default()
        .iter()
        .map(ingredient_from_value)
        .collect();
    if ingredients.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Ingredients array is required",
        ));
    }

    let style_id = request
        .style_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Style ID is required"))?;

    Ok((ingredients, style_id))
}

/// Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "recipe-gateway",
        "timestamp": Utc::now().to_rfc3339(),
        "analyticsEnabled": state.store.is_enabled()
    }))
}

/// API index
pub async fn index_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Recipe Gateway API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "online",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "POST /api/analyze-ingredients": {
                "description": "Analyze food photos to extract ingredients",
                "parameters": { "images": "Array of 1 to 3 base64 encoded images" }
            },
            "POST /api/generate-recipe": {
                "description": "Generate a recipe from ingredients",
                "parameters": { "ingredients": "Array of ingredient objects", "styleId": "Recipe style" }
            },
            "POST /api/stream-recipe": {
                "description": "Generate a recipe as a text stream",
                "parameters": { "ingredients": "Array of ingredient objects", "styleId": "Recipe style" }
            },
            "GET /api/analytics": {
                "description": "Aggregate request statistics",
                "parameters": { "period": "1h, 24h, 7d or 30d" }
            },
            "GET /api/health": { "description": "Health check" }
        }
    }))
}

/// Analyze food photos and return the recognised ingredients
pub async fn analyze_ingredients_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let started = Instant::now();
    admit(&state, &client)?;

    let Json(request) = payload.map_err(invalid_body)?;
    let raws = request.images.unwrap_or_default();
    if raws.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Images array is required",
        ));
    }
    if raws.len() > MAX_IMAGES {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("At most {} images are allowed", MAX_IMAGES),
        ));
    }

    let images = validate_batch(raws.as_slice())
        .map_err(|e| ApiError::from_gateway(ANALYZE_FAILED, &GatewayError::from(e)))?;

    info!(
        "Analyzing {} of {} images for {}",
        images.len(),
        raws.len(),
        client
    );

    let prompt = extraction_prompt(images.len());
    let record = GenerationLogRecord::new(&client, RequestType::AnalyzeIngredients)
        .with_prompt(&prompt)
        .with_ingredients_count(raws.len());

    match state
        .model
        .generate(&prompt, &images, &GenerationParams::extraction())
        .await
    {
        Ok(text) => {
            let ingredients = extract_ingredients(&text);
            let response_time = elapsed_ms(started);
            info!(
                "Extracted {} ingredients for {} in {}ms",
                ingredients.len(),
                client,
                response_time
            );

            let normalized = serde_json::to_string(&ingredients).unwrap_or_default();
            state
                .analytics
                .record(record.succeeded(normalized, response_time));

            Ok(Json(AnalyzeResponse {
                success: true,
                ingredients,
                response_time,
            }))
        }
        Err(err) => {
            let response_time = elapsed_ms(started);
            error!("Ingredient analysis failed for {}: {}", client, err);
            state
                .analytics
                .record(record.failed(err.to_string(), "", response_time));
            Err(ApiError::from_gateway(ANALYZE_FAILED, &err))
        }
    }
}

/// Generate a complete recipe in one response
pub async fn generate_recipe_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let started = Instant::now();
    admit(&state, &client)?;

    let (ingredients, style_id) = recipe_inputs(payload)?;
    info!(
        "Generating {} recipe from {} ingredients for {}",
        style_id,
        ingredients.len(),
        client
    );

    let prompt = recipe_prompt(&ingredients, &style_id);
    let record = GenerationLogRecord::new(&client, RequestType::GenerateRecipe)
        .with_style(&style_id)
        .with_prompt(&prompt)
        .with_ingredients_count(ingredients.len());

    match state
        .model
        .generate(&prompt, &[], &GenerationParams::recipe())
        .await
    {
        Ok(recipe) => {
            let response_time = elapsed_ms(started);
            info!("Recipe generated for {} in {}ms", client, response_time);
            state
                .analytics
                .record(record.succeeded(recipe.clone(), response_time));

            Ok(Json(RecipeResponse {
                success: true,
                recipe,
                response_time,
            }))
        }
        Err(err) => {
            let response_time = elapsed_ms(started);
            error!("Recipe generation failed for {}: {}", client, err);
            state
                .analytics
                .record(record.failed(err.to_string(), "", response_time));
            Err(ApiError::from_gateway(GENERATE_FAILED, &err))
        }
    }
}

/// Generate a recipe and stream the text as it is produced
pub async fn stream_recipe_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    admit(&state, &client)?;

    let (ingredients, style_id) = recipe_inputs(payload)?;
    info!(
        "Streaming {} recipe from {} ingredients for {}",
        style_id,
        ingredients.len(),
        client
    );

    let prompt = recipe_prompt(&ingredients, &style_id);
    let record = GenerationLogRecord::new(&client, RequestType::StreamRecipe)
        .with_style(&style_id)
        .with_prompt(&prompt)
        .with_ingredients_count(ingredients.len());

    let upstream = match state
        .model
        .generate_stream(&prompt, &GenerationParams::recipe())
        .await
    {
        Ok(upstream) => upstream,
        Err(err) => {
            let response_time = elapsed_ms(started);
            error!("Recipe stream failed to start for {}: {}", client, err);
            state
                .analytics
                .record(record.failed(err.to_string(), "", response_time));
            return Err(ApiError::from_gateway(STREAM_FAILED, &err));
        }
    };

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let analytics = state.analytics.clone();

    tokio::spawn(async move {
        let outcome = relay(upstream, tx).await;
        let response_time = elapsed_ms(started);

        let record = match outcome.error {
            None => {
                info!(
                    "Streamed {} bytes to {} in {}ms",
                    outcome.text.len(),
                    client,
                    response_time
                );
                record.succeeded(outcome.text, response_time)
            }
            Some(err) => record.failed(err.to_string(), outcome.text, response_time),
        };

        analytics.record(record);
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// Aggregate statistics over the requested period
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let period = Period::parse(query.period.as_deref());
    let since = period.cutoff(Utc::now());

    let rows = state.store.fetch_since(since).await.map_err(|e| {
        error!("Failed to fetch analytics for {}: {}", period.as_str(), e);
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: ANALYTICS_FAILED.to_string(),
            details: Some(e.to_string()),
        }
    })?;

    info!("Building {} analytics report over {} rows", period.as_str(), rows.len());

    Ok(Json(AnalyticsReport::build(period, &rows)))
}

/// CORS preflight on any route
pub async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

pub async fn not_found_handler(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not found",
            "path": uri.path()
        })),
    )
}
