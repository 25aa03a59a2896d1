//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use atelier_config::{
    BackendConfig, BackendKind, CdnConfig, Config, GalleryConfig, HealthConfig, ImageGenConfig, ServerConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
///
/// Polling runs on a one second interval so queue tests finish quickly.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                },
                imagegen: ImageGenConfig {
                    poll_interval_secs: 1,
                    ..ImageGenConfig::default()
                },
                cdn: None,
                gallery: None,
            },
        }
    }

    /// Add an OpenAI-style inline backend pointed at a mock
    pub fn with_openai_backend(mut self, name: &str, base_url: &str) -> Self {
        self.config.imagegen.backends.insert(
            name.to_owned(),
            backend_config(BackendKind::Openai, base_url),
        );
        self
    }

    /// Add a job-queue backend pointed at a mock
    pub fn with_horde_backend(mut self, name: &str, base_url: &str) -> Self {
        self.config.imagegen.backends.insert(
            name.to_owned(),
            backend_config(BackendKind::Horde, base_url),
        );
        self
    }

    /// Set an explicit fallback ladder for a previously added backend
    pub fn with_fallback(mut self, name: &str, fallback: &[&str]) -> Self {
        let backend = self
            .config
            .imagegen
            .backends
            .get_mut(name)
            .expect("backend added before fallback");
        backend.fallback = Some(fallback.iter().map(|&s| s.to_owned()).collect());
        self
    }

    /// Point CDN uploads at a mock server
    pub fn with_cdn(mut self, api_base: &str) -> Self {
        self.config.cdn = Some(CdnConfig {
            cloud_name: "testcloud".to_owned(),
            upload_preset: "test-preset".to_owned(),
            folder: "generated".to_owned(),
            api_base: Some(api_base.to_owned()),
            url_prefix: "https://res.cloudinary.com/".to_owned(),
            api_key: None,
        });
        self
    }

    /// Point gallery persistence at a mock server
    pub fn with_gallery(mut self, base_url: &str) -> Self {
        self.config.gallery = Some(GalleryConfig {
            base_url: base_url.to_owned(),
            api_key: Some(SecretString::from("test-gallery-key")),
        });
        self
    }

    /// Disable the health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}

fn backend_config(kind: BackendKind, base_url: &str) -> BackendConfig {
    BackendConfig {
        kind,
        api_key: Some(SecretString::from("test-key")),
        base_url: Some(base_url.to_owned()),
        model: None,
        timeout_secs: None,
        fallback: None,
    }
}
