use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;

/// Top-level image generation configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageGenConfig {
    /// Backend configurations keyed by name; map order is the tiebreak
    /// order when building default fallback ladders
    #[serde(default)]
    pub backends: IndexMap<String, BackendConfig>,
    /// Seconds between job poller ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Configuration for a single generation backend
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Backend wire protocol
    #[serde(rename = "type")]
    pub kind: BackendKind,
    /// API key (bearer token or key header, depending on the backend)
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default model when the request does not name one
    #[serde(default)]
    pub model: Option<String>,
    /// Request timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Fallback ladder: backend names tried in order after this one fails.
    /// When absent, a default order derived from backend kinds is used.
    #[serde(default)]
    pub fallback: Option<Vec<String>>,
}

/// Supported generation backend protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// JSON API returning inline base64 (`b64_json`) or a transient URL
    Openai,
    /// JSON request, raw image bytes response
    Stability,
    /// Job-queue backend: async submit plus status polling
    Horde,
    /// Self-hosted inference server with a probed submission surface
    Local,
}

impl BackendKind {
    /// Default outbound timeout for this backend
    ///
    /// Local inference is slower and should not be prematurely aborted;
    /// the binary-returning backend also gets extra headroom.
    pub const fn default_timeout_secs(self) -> u64 {
        match self {
            Self::Openai | Self::Horde => 30,
            Self::Stability => 60,
            Self::Local => 90,
        }
    }

    /// Preferred fallback order of backend kinds after this one
    pub const fn default_fallback(self) -> [Self; 3] {
        match self {
            Self::Openai => [Self::Stability, Self::Horde, Self::Local],
            Self::Stability => [Self::Openai, Self::Horde, Self::Local],
            Self::Horde => [Self::Openai, Self::Stability, Self::Local],
            Self::Local => [Self::Openai, Self::Stability, Self::Horde],
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}
