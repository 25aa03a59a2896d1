#![allow(clippy::must_use_candidate)]

pub mod cdn;
mod env;
pub mod gallery;
pub mod imagegen;
mod loader;
pub mod server;

use serde::Deserialize;

pub use cdn::CdnConfig;
pub use gallery::GalleryConfig;
pub use imagegen::{BackendConfig, BackendKind, ImageGenConfig};
pub use server::{HealthConfig, ServerConfig};

/// Top-level atelier configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Image generation backend configuration
    #[serde(default)]
    pub imagegen: ImageGenConfig,
    /// CDN upload configuration
    #[serde(default)]
    pub cdn: Option<CdnConfig>,
    /// Gallery persistence service configuration
    #[serde(default)]
    pub gallery: Option<GalleryConfig>,
}
