use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured, a fallback ladder
    /// references an unknown backend, or the CDN section is missing while
    /// backends are configured
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_has_backends()?;
        self.validate_fallback_ladders()?;
        self.validate_cdn()?;
        Ok(())
    }

    fn validate_has_backends(&self) -> anyhow::Result<()> {
        if self.imagegen.backends.is_empty() {
            anyhow::bail!("at least one generation backend must be configured under [imagegen.backends]");
        }
        Ok(())
    }

    fn validate_fallback_ladders(&self) -> anyhow::Result<()> {
        for (name, backend) in &self.imagegen.backends {
            let Some(ref fallback) = backend.fallback else {
                continue;
            };

            for entry in fallback {
                if entry == name {
                    anyhow::bail!("backend '{name}' lists itself in its fallback ladder");
                }
                if !self.imagegen.backends.contains_key(entry) {
                    anyhow::bail!("backend '{name}' fallback references unknown backend '{entry}'");
                }
            }
        }

        if self.imagegen.poll_interval_secs == 0 {
            anyhow::bail!("imagegen.poll_interval_secs must be greater than 0");
        }

        Ok(())
    }

    fn validate_cdn(&self) -> anyhow::Result<()> {
        let Some(ref cdn) = self.cdn else {
            anyhow::bail!("a [cdn] section is required to store generated assets");
        };

        if cdn.cloud_name.is_empty() || cdn.upload_preset.is_empty() {
            anyhow::bail!("cdn.cloud_name and cdn.upload_preset must not be empty");
        }

        Ok(())
    }
}
