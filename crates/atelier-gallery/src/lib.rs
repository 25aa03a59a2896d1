#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Gallery persistence bridge
//!
//! The gallery service owns the catalog of images, albums, and tags; this
//! crate only speaks its "save generated asset" contract. Generated images
//! are saved with private visibility; republishing as public is an explicit
//! user action inside the gallery itself.

use std::time::Duration;

use async_trait::async_trait;
use atelier_config::GalleryConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who can see a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

/// A finished generation handed to the gallery for cataloguing
#[derive(Debug, Clone, Serialize)]
pub struct SaveRequest {
    /// Prompt the image was generated from
    pub prompt_text: String,
    /// Generation settings as an opaque JSON blob
    pub settings: serde_json::Value,
    /// Name of the backend that produced the image
    pub provider: String,
    /// Record title
    pub title: String,
    /// Record caption
    pub caption: String,
    /// Initial visibility
    pub visibility: Visibility,
    /// Durable CDN URL of the stored image
    pub image_url: String,
}

/// Identifier and canonical URL of the stored record
#[derive(Debug, Clone, Deserialize)]
pub struct SavedRecord {
    pub id: String,
    pub canonical_url: String,
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery save failed ({status}): {message}")]
    Save { status: u16, message: String },

    #[error("gallery unreachable: {0}")]
    Connection(String),
}

/// Contract the orchestrator/poller pair depends on
#[async_trait]
pub trait GalleryBridge: Send + Sync {
    /// Store a catalog record for a finished generation
    async fn save(&self, request: &SaveRequest) -> Result<SavedRecord, GalleryError>;
}

/// HTTP implementation posting to the gallery service
pub struct HttpGalleryBridge {
    client: reqwest::Client,
    config: GalleryConfig,
}

impl HttpGalleryBridge {
    pub fn new(config: GalleryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }
}

#[async_trait]
impl GalleryBridge for HttpGalleryBridge {
    async fn save(&self, request: &SaveRequest) -> Result<SavedRecord, GalleryError> {
        let url = format!(
            "{}/internal/generated-images",
            self.config.base_url.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.header("X-Api-Key", key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GalleryError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GalleryError::Save {
                status: status.as_u16(),
                message,
            });
        }

        let record: SavedRecord = response
            .json()
            .await
            .map_err(|e| GalleryError::Connection(format!("unparseable save response: {e}")))?;

        tracing::debug!(record_id = %record.id, "generation catalogued in gallery");

        Ok(record)
    }
}
