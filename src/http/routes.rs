//! Route handlers for the local HTTP surface.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::AppContext;
use crate::http::realtime::{self, RealtimeEvent};
use crate::http::response::ApiError;

pub const LANGUAGE_PATH: &str = "/Settings/v.1.0/Language";

#[derive(Debug, Serialize, Deserialize)]
pub struct LanguageBody {
    pub language: String,
}

#[derive(Debug, Serialize)]
pub struct BetaStatus {
    pub beta: bool,
}

#[derive(Debug, Serialize)]
pub struct ThreadPoolStatus {
    pub size: usize,
}

/// Every built-in route, before middleware.
pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/version", get(get_version))
        .route("/beta", get(get_beta))
        .route(LANGUAGE_PATH, get(get_language).post(set_language))
        .route("/threadpool", get(get_threadpool))
        .route("/up", get(get_up))
        .route("/socket", get(realtime::socket_handler))
}

pub async fn get_version(State(ctx): State<AppContext>) -> Json<BTreeMap<String, String>> {
    Json(ctx.versions().clone())
}

pub async fn get_beta(State(ctx): State<AppContext>) -> Json<BetaStatus> {
    Json(BetaStatus {
        beta: ctx.config().features.beta,
    })
}

pub async fn get_language(State(ctx): State<AppContext>) -> Result<Json<LanguageBody>, ApiError> {
    let language = ctx
        .settings()
        .language()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(LanguageBody { language }))
}

/// Persist the language, then tell socket clients about it.
pub async fn set_language(State(ctx): State<AppContext>, body: Bytes) -> Result<StatusCode, ApiError> {
    let update: LanguageBody =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedRequestBody(e.to_string()))?;

    ctx.settings()
        .set_language(update.language.clone())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(language = %update.language, "Language updated");
    ctx.realtime().publish(RealtimeEvent::new(
        LANGUAGE_PATH,
        json!({ "language": update.language }),
    ));
    Ok(StatusCode::OK)
}

pub async fn get_threadpool(State(ctx): State<AppContext>) -> Json<ThreadPoolStatus> {
    Json(ThreadPoolStatus {
        size: ctx.config().runtime.blocking_threads,
    })
}

pub async fn get_up() -> impl IntoResponse {
    (StatusCode::OK, [(header::CACHE_CONTROL, "no-store")])
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
