use http::StatusCode;

/// Contract for rendering domain errors as HTTP responses
///
/// The generation and ingestion crates each own an error enum; implementing
/// this trait is what lets the route layer turn any of them into the
/// `{"error": {"message", "type", "code"}}` envelope the generation
/// endpoints answer with, without those crates depending on axum.
pub trait HttpError: std::error::Error {
    /// Status code of the rendered response
    fn status_code(&self) -> StatusCode;

    /// Stable machine-readable category (e.g. `upstream_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    ///
    /// Raw backend bodies only appear here pre-truncated by the error
    /// constructor; credentials never do.
    fn client_message(&self) -> String;
}
