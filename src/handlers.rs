use crate::{
    error::ProxyError,
    identifier,
    models::{ProxyQuery, ProxySuccess},
    normalize::normalize,
    AppState,
};
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use std::time::Instant;

// ===================================================================
//                          DOWNLOAD PROXY
// ===================================================================

/// # GET /api/download/ytmp3 - Resolves a YouTube link to an audio download link.
pub async fn ytmp3(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Result<Response, ProxyError> {
    let params = ProxyQuery::from_raw(raw.as_deref());
    let success = resolve(&state, params.url.as_deref()).await?;

    if params.wants_redirect() {
        tracing::info!("Redirecting to {}", success.result.download_url);
        return Ok(Redirect::temporary(&success.result.download_url).into_response());
    }

    Ok((StatusCode::OK, Json(success)).into_response())
}

/// One proxy request: sanitize, call upstream once, normalize.
pub async fn resolve(state: &AppState, raw_url: Option<&str>) -> Result<ProxySuccess, ProxyError> {
    let start = Instant::now();
    let id = identifier::sanitize(raw_url)?;
    tracing::info!("Resolving {} (canonical {})", id.raw, id.canonical);

    let reply = state.upstream.fetch(&id.canonical).await?;
    let success = normalize(&reply, state.upstream.format())?;

    tracing::info!(
        "Resolved {} in {}ms",
        id.canonical,
        start.elapsed().as_millis()
    );
    Ok(success)
}

// ===================================================================
//                          HEALTH
// ===================================================================

/// # GET /api/ping - Keep-alive probe.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": true })))
}
