use axum::response::IntoResponse;
use http::StatusCode;

/// Liveness probe
///
/// Reports only that the HTTP layer is accepting requests. Backend, CDN,
/// and gallery reachability are not probed here; upstream trouble surfaces
/// through generation errors, not liveness.
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
