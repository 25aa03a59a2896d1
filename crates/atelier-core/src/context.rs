use secrecy::SecretString;

/// Runtime context for outbound backend requests
///
/// Shared across the generation and ingestion request flows
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP request parts (method, URI, headers, extensions)
    pub parts: http::request::Parts,
    /// User-provided API key that overrides the configured backend key
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Create a minimal context for embedded (non-HTTP) use
    ///
    /// Contains empty headers and no API key override
    pub fn empty() -> Self {
        let (parts, _) = http::Request::builder()
            .method(http::Method::GET)
            .uri("/")
            .body(())
            .expect("valid minimal request")
            .into_parts();

        Self { parts, api_key: None }
    }

    /// Access request headers
    pub fn headers(&self) -> &http::HeaderMap {
        &self.parts.headers
    }
}
