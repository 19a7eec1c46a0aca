//! Integration tests for the Recipe Gateway API

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use recipe_common::{GenerationLogRecord, RequestType};
use recipe_core::ValidatedImage;
use recipe_gateway::{
    analytics::{AnalyticsError, AnalyticsStore, DisabledStore},
    create_router,
    error::GatewayError,
    model::{GenerationParams, GenerativeModel},
    rate_limiter::RateLimiter,
    report::LogRow,
    sse::TextStream,
    AppState,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

/// Model double with canned replies
#[derive(Default)]
struct FakeModel {
    reply: Option<String>,
    fragments: Vec<Result<String, String>>,
    stream_refused: bool,
    stalls: bool,
    calls: AtomicUsize,
}

impl FakeModel {
    fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self::default()
    }

    fn streaming(fragments: Vec<Result<&str, &str>>) -> Self {
        Self {
            fragments: fragments
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
            ..Self::default()
        }
    }

    fn refusing_stream() -> Self {
        Self {
            stream_refused: true,
            ..Self::default()
        }
    }

    /// Stream the fragments, then never yield again
    fn stalling(fragments: Vec<&str>) -> Self {
        Self {
            stalls: true,
            ..Self::streaming(fragments.into_iter().map(Ok).collect())
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(
        &self,
        _prompt: &str,
        _images: &[ValidatedImage],
        _params: &GenerationParams,
    ) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(GatewayError::Upstream {
            status: 503,
            body: "model overloaded".to_string(),
        })
    }

    async fn generate_stream(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextStream, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stream_refused {
            return Err(GatewayError::Upstream {
                status: 503,
                body: "model overloaded".to_string(),
            });
        }

        let items: Vec<Result<String, GatewayError>> = self
            .fragments
            .iter()
            .cloned()
            .map(|r| r.map_err(GatewayError::UpstreamMalformed))
            .collect();
        let upstream = futures::stream::iter(items);
        if self.stalls {
            Ok(upstream.chain(futures::stream::pending()).boxed())
        } else {
            Ok(upstream.boxed())
        }
    }
}

/// Store double keeping records in memory
#[derive(Default)]
struct RecordingStore {
    records: Mutex<Vec<GenerationLogRecord>>,
}

impl RecordingStore {
    fn snapshot(&self) -> Vec<GenerationLogRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsStore for RecordingStore {
    async fn insert(&self, record: &GenerationLogRecord) -> Result<(), AnalyticsError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<LogRow>, AnalyticsError> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| LogRow {
                client_ip: Some(r.client_id),
                request_type: Some(r.request_type.to_string()),
                ingredients_count: Some(r.ingredients_count as i64),
                style_id: r.style_id,
                response_time_ms: Some(r.response_time_ms),
                success: Some(r.success),
                error_message: r.error_message,
                timestamp: Some(r.timestamp),
            })
            .collect())
    }
}

/// Store double that is always down
struct FailingStore;

#[async_trait]
impl AnalyticsStore for FailingStore {
    async fn insert(&self, _record: &GenerationLogRecord) -> Result<(), AnalyticsError> {
        Err(AnalyticsError::Store {
            status: 500,
            body: "store unavailable".to_string(),
        })
    }

    async fn fetch_since(&self, _since: DateTime<Utc>) -> Result<Vec<LogRow>, AnalyticsError> {
        Err(AnalyticsError::Store {
            status: 500,
            body: "store unavailable".to_string(),
        })
    }
}

/// Helper to create a test app around the given doubles
fn create_test_app(model: Arc<FakeModel>, store: Arc<dyn AnalyticsStore>) -> Router {
    let state = AppState::new(model, store, RateLimiter::new(10));
    create_router(state)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Analytics writes are detached; poll until they land
async fn wait_for_records(store: &RecordingStore, count: usize) -> Vec<GenerationLogRecord> {
    for _ in 0..200 {
        let records = store.snapshot();
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} analytics records, got {}", count, store.snapshot().len());
}

fn jpeg_base64() -> String {
    "/9j/4AAQSkZJRgABAQ".repeat(4)
}

fn recipe_body() -> Value {
    json!({
        "ingredients": [
            {"name": "egg", "quantity": "2", "unit": "pieces"},
            {"name": "spinach", "quantity": "1", "unit": "cup"}
        ],
        "styleId": "high-protein"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(RecordingStore::default()));

    let response = app.oneshot(empty_request(Method::GET, "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "recipe-gateway");
    assert_eq!(json["analyticsEnabled"], true);
}

#[tokio::test]
async fn test_api_index_under_prefix() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(DisabledStore));

    let response = app.oneshot(empty_request(Method::GET, "/api")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "online");
    assert!(json["endpoints"]["POST /api/stream-recipe"].is_object());
}

#[tokio::test]
async fn test_analyze_requires_images() {
    let model = Arc::new(FakeModel::replying("[]"));
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(model.clone(), store.clone());

    let response = app
        .oneshot(json_request(Method::POST, "/analyze-ingredients", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Images array is required");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_rejects_too_many_images() {
    let model = Arc::new(FakeModel::replying("[]"));
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    let images = vec![jpeg_base64(); 4];
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/analyze-ingredients",
            json!({ "images": images }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_with_no_valid_images() {
    let model = Arc::new(FakeModel::replying("[]"));
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(model.clone(), store.clone());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/analyze-ingredients",
            json!({ "images": ["abc", "not base64 at all!!"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "No valid images");
    assert_eq!(model.calls(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_analyze_extracts_ingredients() {
    let model = Arc::new(FakeModel::replying(
        "Here you go:\n```json\n[{\"name\":\"egg\",\"quantity\":\"2\",\"unit\":\"pieces\"}, \"milk\"]\n```",
    ));
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(model.clone(), store.clone());

    let images = vec![
        format!("data:image/jpeg;base64,{}", jpeg_base64()),
        "tiny".to_string(),
    ];
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/analyze-ingredients",
            json!({ "images": images }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["ingredients"],
        json!([
            {"name": "egg", "quantity": "2", "unit": "pieces"},
            {"name": "milk", "quantity": "1", "unit": "piece"}
        ])
    );
    assert!(json["responseTime"].is_u64());

    let records = wait_for_records(&store, 1).await;
    assert_eq!(records[0].request_type, RequestType::AnalyzeIngredients);
    assert_eq!(records[0].client_id, "198.51.100.4");
    // Submitted images, including the one dropped as too small
    assert_eq!(records[0].ingredients_count, 2);
    assert!(records[0].success);
    let logged: Value = serde_json::from_str(&records[0].response_text).unwrap();
    assert_eq!(logged, json["ingredients"]);
}

#[tokio::test]
async fn test_generate_recipe() {
    let model = Arc::new(FakeModel::replying("# Spinach omelette"));
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(model, store.clone());

    let response = app
        .oneshot(json_request(Method::POST, "/generate-recipe", recipe_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["recipe"], "# Spinach omelette");

    let records = wait_for_records(&store, 1).await;
    assert_eq!(records[0].request_type, RequestType::GenerateRecipe);
    assert_eq!(records[0].style_id.as_deref(), Some("high-protein"));
    assert_eq!(records[0].ingredients_count, 2);
    assert!(records[0].prompt_text.contains("2 pieces egg, 1 cup spinach"));
    assert_eq!(records[0].response_text, "# Spinach omelette");
}

#[tokio::test]
async fn test_generate_recipe_requires_style() {
    let model = Arc::new(FakeModel::replying("unused"));
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/generate-recipe",
            json!({ "ingredients": ["egg"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Style ID is required");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(RecordingStore::default()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-recipe")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_wrongly_typed_ingredients_is_bad_request() {
    let model = Arc::new(FakeModel::replying("unused"));
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/generate-recipe",
            json!({ "ingredients": "egg", "styleId": "vegan" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_wrongly_typed_images_is_bad_request() {
    let model = Arc::new(FakeModel::replying("unused"));
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/analyze-ingredients",
            json!({ "images": "abc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_logged_and_reported() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(Arc::new(FakeModel::failing()), store.clone());

    let response = app
        .oneshot(json_request(Method::POST, "/generate-recipe", recipe_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Failed to generate recipe");
    assert!(json["details"].as_str().unwrap().contains("503"));

    let records = wait_for_records(&store, 1).await;
    assert!(!records[0].success);
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("model overloaded"));
}

#[tokio::test]
async fn test_rate_limit_rejects_eleventh_request() {
    let model = Arc::new(FakeModel::replying("recipe"));
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/generate-recipe", recipe_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} rejected", i + 1);
    }

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/stream-recipe", recipe_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(
        json,
        json!({ "error": "Rate limit exceeded. Please wait before making another request." })
    );
    assert_eq!(model.calls(), 10);

    // A different client has its own window
    let mut request = json_request(Method::POST, "/generate-recipe", recipe_body());
    request
        .headers_mut()
        .insert("x-forwarded-for", "192.0.2.50".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stream_recipe_relays_text() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(
        Arc::new(FakeModel::streaming(vec![Ok("Hello "), Ok("world")])),
        store.clone(),
    );

    let response = app
        .oneshot(json_request(Method::POST, "/stream-recipe", recipe_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"Hello world");

    let records = wait_for_records(&store, 1).await;
    assert_eq!(records[0].request_type, RequestType::StreamRecipe);
    assert!(records[0].success);
    assert_eq!(records[0].response_text, "Hello world");
}

#[tokio::test]
async fn test_stream_recipe_upstream_failure_mid_stream() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(
        Arc::new(FakeModel::streaming(vec![Ok("Hello "), Err("connection reset")])),
        store.clone(),
    );

    let response = app
        .oneshot(json_request(Method::POST, "/stream-recipe", recipe_body()))
        .await
        .unwrap();

    // Headers were already sent; the failure shows up as a broken body
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(body.is_err());

    let records = wait_for_records(&store, 1).await;
    assert!(!records[0].success);
    assert_eq!(records[0].response_text, "Hello ");
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection reset"));
}

#[tokio::test]
async fn test_stream_recipe_cannot_start() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(Arc::new(FakeModel::refusing_stream()), store.clone());

    let response = app
        .oneshot(json_request(Method::POST, "/stream-recipe", recipe_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Streaming failed");
    assert!(json["details"]
        .as_str()
        .unwrap()
        .contains("model overloaded"));

    let records = wait_for_records(&store, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.snapshot().len(), 1);
    assert_eq!(records[0].request_type, RequestType::StreamRecipe);
    assert!(!records[0].success);
    assert!(records[0].response_text.is_empty());
}

#[tokio::test]
async fn test_stream_recipe_client_disconnect_is_logged() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(Arc::new(FakeModel::stalling(vec!["Hello "])), store.clone());

    let response = app
        .oneshot(json_request(Method::POST, "/stream-recipe", recipe_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"Hello ");
    drop(body);

    let records = wait_for_records(&store, 1).await;
    assert!(!records[0].success);
    assert_eq!(records[0].error_message.as_deref(), Some("Client disconnected"));
    assert_eq!(records[0].response_text, "Hello ");
}

#[tokio::test]
async fn test_analytics_failure_does_not_affect_response() {
    let app = create_test_app(Arc::new(FakeModel::replying("# Soup")), Arc::new(FailingStore));

    let response = app
        .oneshot(json_request(Method::POST, "/generate-recipe", recipe_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["recipe"], "# Soup");
}

#[tokio::test]
async fn test_analytics_report() {
    let store = Arc::new(RecordingStore::default());
    let app = create_test_app(Arc::new(FakeModel::replying("# Soup")), store.clone());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/generate-recipe", recipe_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    wait_for_records(&store, 2).await;

    let response = app
        .oneshot(empty_request(Method::GET, "/api/analytics?period=1h"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["period"], "1h");
    assert_eq!(json["totalRequests"], 2);
    assert_eq!(json["successRate"], "100.00%");
    assert_eq!(json["popularStyles"][0], json!({"style": "high-protein", "count": 2}));
    assert_eq!(json["requestTypes"]["generate_recipe"], 2);
    assert_eq!(json["recentActivity"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_analytics_unavailable() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(DisabledStore));

    let response = app
        .oneshot(empty_request(Method::GET, "/analytics"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Failed to fetch analytics");
    assert!(json["details"].is_string());
}

#[tokio::test]
async fn test_method_not_allowed() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(empty_request(Method::GET, "/api/generate-recipe"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "error": "Method not allowed" }));
}

#[tokio::test]
async fn test_options_preflight() {
    let model = Arc::new(FakeModel::failing());
    let app = create_test_app(model.clone(), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(empty_request(Method::OPTIONS, "/stream-recipe"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_unknown_path() {
    let app = create_test_app(Arc::new(FakeModel::failing()), Arc::new(RecordingStore::default()));

    let response = app
        .oneshot(empty_request(Method::GET, "/no-such-endpoint"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Not found");
    assert_eq!(json["path"], "/no-such-endpoint");
}
