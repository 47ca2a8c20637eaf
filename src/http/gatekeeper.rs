//! Request gatekeeper.
//! Enforces the shared-secret check and assigns request IDs.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::context::AppContext;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// Query parameter carrying the token on socket handshakes.
pub const TOKEN_QUERY_PARAM: &str = "token";

pub async fn gatekeeper(State(ctx): State<AppContext>, mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let upgrade = is_websocket_upgrade(&request);

    // CORS preflight never carries credentials.
    if method != Method::OPTIONS
        && ctx.config().security.check_enabled
        && !presents_secret(&ctx, &request, upgrade)
    {
        let surface = if upgrade { "socket" } else { "http" };
        metrics::record_auth_rejection(surface);
        tracing::warn!(method = %method, path = %path, surface, "Rejected request without valid token");
        return ApiError::AuthenticationFailure.into_response();
    }

    let id = ctx.request_ids().next_id();
    let start = Instant::now();
    tracing::info!(request_id = %id, method = %method, path = %path, "Request accepted");
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;

    let status = response.status();
    tracing::info!(
        request_id = %id,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status.as_u16(), start);
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

fn presents_secret(ctx: &AppContext, request: &Request, upgrade: bool) -> bool {
    let secret = ctx.secret();
    let header_name = ctx.config().security.header_name.as_str();

    let from_header = request
        .headers()
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|token| secret.verify(token));
    if from_header {
        return true;
    }

    upgrade && query_token(request).is_some_and(|token| secret.verify(&token))
}

fn query_token(request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

fn is_websocket_upgrade(request: &Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}
