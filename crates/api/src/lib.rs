pub mod diagnostics;
pub mod webhook;

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use codecolors_core::{ConversationEvent, RouteOutcome, RoutedTurn};
use codecolors_fulfillment::{build_router as build_intent_router, FulfillmentAgent};
use codecolors_observability::{AppMetrics, MetricsSnapshot};
use codecolors_storage::Store;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::webhook::{WebhookRequest, WebhookResponse};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<FulfillmentAgent<Store>>,
    pub metrics: Arc<AppMetrics>,
    pub store_backend: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    default_locale: String,
    locales: Vec<String>,
    intent_names: usize,
    store_backend: &'static str,
}

/// Native request: the event plus an optional user id whose stored state the server keeps.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub event: ConversationEvent,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub handled: bool,
    #[serde(flatten)]
    pub turn: Option<RoutedTurn>,
}

pub async fn build_app(locales_dir: impl AsRef<Path>) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let router =
        Arc::new(build_intent_router(locales_dir).context("failed to initialize intent router")?);

    let store = if let Ok(database_url) = env::var("CODECOLORS_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };
    let store_backend = store.backend();

    let agent = Arc::new(FulfillmentAgent::new(
        router,
        Arc::new(store),
        metrics.clone(),
    ));

    Ok(build_router(ApiState {
        agent,
        metrics,
        store_backend,
    }))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fulfillment", post(fulfillment))
        .route("/v1/route", post(route_event))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let router = state.agent.router();
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        default_locale: router.resolver().default_locale().to_string(),
        locales: router.resolver().available().map(str::to_string).collect(),
        intent_names: router.registry().len(),
        store_backend: state.store_backend,
    };
    (StatusCode::OK, Json(payload))
}

fn fulfillment_failed(error: &anyhow::Error) -> Response {
    tracing::error!(error = %format!("{error:#}"), "fulfillment failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "fulfillment_failed",
            "message": error.to_string()
        })),
    )
        .into_response()
}

/// Dialogflow webhook. State rides in `userStorage`, so nothing is persisted here.
async fn fulfillment(
    State(state): State<ApiState>,
    Json(request): Json<WebhookRequest>,
) -> impl IntoResponse {
    let incoming_storage = request.user_storage().map(str::to_string);
    let event = request.into_event();

    match state.agent.handle_event(&event) {
        Ok(RouteOutcome::Handled(turn)) => (
            StatusCode::OK,
            Json(WebhookResponse::from_directive(
                &turn.directive,
                incoming_storage.as_deref(),
            )),
        )
            .into_response(),
        Ok(RouteOutcome::Unhandled) => {
            (StatusCode::OK, Json(serde_json::json!({}))).into_response()
        }
        Err(error) => fulfillment_failed(&error),
    }
}

async fn route_event(
    State(state): State<ApiState>,
    Json(request): Json<RouteRequest>,
) -> impl IntoResponse {
    let user_id = request
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|user_id| !user_id.is_empty());

    let outcome = match user_id {
        Some(user_id) => state.agent.handle_turn(user_id, request.event).await,
        None => state.agent.handle_event(&request.event),
    };

    match outcome {
        Ok(RouteOutcome::Handled(turn)) => (
            StatusCode::OK,
            Json(RouteResponse {
                handled: true,
                turn: Some(turn),
            }),
        )
            .into_response(),
        Ok(RouteOutcome::Unhandled) => (
            StatusCode::OK,
            Json(RouteResponse {
                handled: false,
                turn: None,
            }),
        )
            .into_response(),
        Err(error) => fulfillment_failed(&error),
    }
}
