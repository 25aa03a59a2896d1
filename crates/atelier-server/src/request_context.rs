use atelier_core::RequestContext;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use secrecy::SecretString;

/// Middleware that constructs a [`RequestContext`] from the incoming request
///
/// A caller-supplied `X-Backend-Api-Key` header becomes a per-request
/// override of the configured backend credentials.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let api_key = parts
        .headers
        .get("x-backend-api-key")
        .and_then(|value| value.to_str().ok())
        .map(SecretString::from);

    let context = RequestContext {
        parts: parts.clone(),
        api_key,
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    next.run(request).await
}
