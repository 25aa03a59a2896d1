use secrecy::SecretString;
use serde::Deserialize;

/// CDN upload configuration (Cloudinary-style unsigned upload API)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CdnConfig {
    /// Account namespace, forms part of the upload URL
    pub cloud_name: String,
    /// Unsigned upload preset name
    pub upload_preset: String,
    /// Folder generated assets are stored under
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Upload API base URL override
    #[serde(default)]
    pub api_base: Option<String>,
    /// Required prefix of `secure_url` in upload responses; anything else
    /// is treated as a corrupt response
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    /// API key for signed uploads (unused with unsigned presets)
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

fn default_folder() -> String {
    "generated".to_owned()
}

fn default_url_prefix() -> String {
    "https://res.cloudinary.com/".to_owned()
}
