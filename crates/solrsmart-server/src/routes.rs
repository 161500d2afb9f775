use crate::metrics;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use solrsmart_backend::{CancellationToken, SmartSearch, SmartSearchRequest};
use solrsmart_core::{summarize_schema, SearchError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub engine: SmartSearch,
    pub shutdown: CancellationToken,
}

impl AppState {
    // Child of the shutdown token; the guard cancels it when the handler
    // future is dropped on client disconnect.
    fn request_token(&self) -> (CancellationToken, tokio_util::sync::DropGuard) {
        let token = self.shutdown.child_token();
        let guard = token.clone().drop_guard();
        (token, guard)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/v1/:collection/schema", get(schema))
        .route("/v1/:collection/smart-search", post(smart_search))
        .route("/v1/:collection/commit", post(commit))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "http",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %uuid::Uuid::new_v4()
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub fn status_for(e: &SearchError) -> StatusCode {
    match e {
        SearchError::Invalid(_) => StatusCode::BAD_REQUEST,
        SearchError::ModeDisabled(_) => StatusCode::FORBIDDEN,
        SearchError::Upstream { .. } | SearchError::Decode { .. } => StatusCode::BAD_GATEWAY,
        SearchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Config(_) | SearchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(route: &str, e: SearchError) -> Response {
    let status = status_for(&e);
    metrics::record(route, status);
    if status.is_server_error() {
        warn!(route, error = %e, "request failed");
    }
    let mut body = json!({"error": e.to_string()});
    if let Some(call) = e.call() {
        body["call"] = json!(call.as_str());
    }
    (status, Json(body)).into_response()
}

fn ok_response(route: &str, body: serde_json::Value) -> Response {
    metrics::record(route, StatusCode::OK);
    (StatusCode::OK, Json(body)).into_response()
}

#[derive(Debug, Deserialize, Default)]
struct HealthOpts {
    #[serde(default)]
    deep: bool,
}

async fn health(State(app): State<AppState>, Query(opts): Query<HealthOpts>) -> Response {
    if !opts.deep {
        return (StatusCode::OK, "ok").into_response();
    }
    let (token, _guard) = app.request_token();
    match app.engine.cluster_status(&token).await {
        Ok(cluster) => ok_response("health", json!({"status": "ok", "cluster": cluster})),
        Err(e) => error_response("health", e),
    }
}

async fn metrics_text() -> impl IntoResponse {
    (StatusCode::OK, metrics::render())
}

async fn schema(State(app): State<AppState>, Path(collection): Path<String>) -> Response {
    let (token, _guard) = app.request_token();
    match app.engine.schema(&collection, &token).await {
        Ok(fc) => {
            let summary = summarize_schema(&fc);
            ok_response("schema", json!({"catalog": &*fc, "summary": summary}))
        }
        Err(e) => error_response("schema", e),
    }
}

async fn smart_search(
    State(app): State<AppState>,
    Path(collection): Path<String>,
    Json(mut req): Json<SmartSearchRequest>,
) -> Response {
    req.collection = collection;
    let (token, _guard) = app.request_token();
    match app.engine.search(&req, &token).await {
        Ok(out) => match serde_json::to_value(&out) {
            Ok(v) => ok_response("smart_search", v),
            Err(e) => error_response("smart_search", SearchError::Internal(e.to_string())),
        },
        Err(e) => error_response("smart_search", e),
    }
}

async fn commit(State(app): State<AppState>, Path(collection): Path<String>) -> Response {
    let (token, _guard) = app.request_token();
    match app.engine.commit(&collection, &token).await {
        Ok(v) => ok_response("commit", v),
        Err(e) => error_response("commit", e),
    }
}
