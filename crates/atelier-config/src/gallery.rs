use secrecy::SecretString;
use serde::Deserialize;

/// Gallery persistence service configuration
///
/// The gallery is an external collaborator; completed generations are
/// posted to it as private records.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryConfig {
    /// Base URL of the gallery service
    pub base_url: String,
    /// Service-to-service API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
}
