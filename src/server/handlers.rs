// src/server/handlers.rs
// HTTP verb surface: one JSON object per request, every response stamped
// with an ISO-8601 UTC timestamp

use crate::verbs::{
    AskRequest, AugmentRequest, ComposeRequest, DecomposeRequest, Dispatcher, ForgetRequest,
    InspectRequest, NavigateRequest, PanRequest, RecallRequest, RememberRequest, TellRequest,
    TiltRequest, VerbCall, VerbResponse, ZoomRequest,
};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Verb envelopes carry their own HTTP status
pub struct WireResponse(pub VerbResponse);

impl IntoResponse for WireResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

async fn run(dispatcher: &Dispatcher, call: VerbCall) -> WireResponse {
    WireResponse(dispatcher.dispatch(call, CancellationToken::new()).await)
}

pub async fn tell(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<TellRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Tell(req)).await
}

pub async fn ask(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<AskRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Ask(req)).await
}

pub async fn augment(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<AugmentRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Augment(req)).await
}

pub async fn remember(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<RememberRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Remember(req)).await
}

pub async fn recall(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<RecallRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Recall(req)).await
}

pub async fn forget(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<ForgetRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Forget(req)).await
}

pub async fn zoom(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<ZoomRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Zoom(req)).await
}

pub async fn pan(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<PanRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Pan(req)).await
}

pub async fn tilt(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<TiltRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Tilt(req)).await
}

pub async fn inspect(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<InspectRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Inspect(req)).await
}

pub async fn compose(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<ComposeRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Compose(req)).await
}

pub async fn decompose(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<DecomposeRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Decompose(req)).await
}

pub async fn navigate(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<NavigateRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Navigate(req)).await
}

/// Plain chat: ask with context, no speculation or enrichment
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    fn into_ask(self, enhanced: bool) -> AskRequest {
        AskRequest {
            question: self.message,
            mode: None,
            use_context: true,
            use_hyde: enhanced,
            use_wikipedia: enhanced,
            use_wikidata: enhanced,
            threshold: None,
            session_id: self.session_id,
        }
    }
}

pub async fn chat(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<ChatRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Ask(req.into_ask(false))).await
}

/// Enhanced chat: HyDE plus the external enrichment hooks
pub async fn chat_enhanced(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(req): Json<ChatRequest>,
) -> WireResponse {
    run(&dispatcher, VerbCall::Ask(req.into_ask(true))).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Read-only server/session state snapshot
pub async fn state(
    State(dispatcher): State<Arc<Dispatcher>>,
    Query(query): Query<StateQuery>,
) -> Response {
    let app = dispatcher.state();
    let session_state = match &query.session_id {
        Some(id) => app.sessions.snapshot(id).await.map(|s| json!(s)),
        None => None,
    };
    Json(json!({
        "success": true,
        "activeSessions": app.sessions.active_count().await,
        "state": session_state,
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
    .into_response()
}

/// Liveness with session count
pub async fn health(State(dispatcher): State<Arc<Dispatcher>>) -> Response {
    let app = dispatcher.state();
    Json(json!({
        "status": "ok",
        "activeSessions": app.sessions.active_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
    .into_response()
}
