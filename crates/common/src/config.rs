use serde::Deserialize;
use std::time::Duration;

/// Runtime settings for analysis and bounded extraction.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub extract: ExtractSettings,
    #[serde(default)]
    pub analyze: AnalyzeSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Rows per record batch. Larger batches mean fewer reader calls but a
    /// coarser fit to the byte budget.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_parallel_decode")]
    pub parallel_decode: bool,
    #[serde(default = "default_metadata_prefetch_bytes")]
    pub metadata_prefetch_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AnalyzeSettings {
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_batch_size() -> usize {
    1000
}

fn default_parallel_decode() -> bool {
    true
}

fn default_metadata_prefetch_bytes() -> usize {
    64 * 1024
}

fn default_probe_timeout_secs() -> u64 {
    30
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parallel_decode: default_parallel_decode(),
            metadata_prefetch_bytes: default_metadata_prefetch_bytes(),
        }
    }
}

impl Default for AnalyzeSettings {
    fn default() -> Self {
        Self { probe_timeout_secs: default_probe_timeout_secs() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self { extract: ExtractSettings::default(), analyze: AnalyzeSettings::default() }
    }
}

impl Settings {
    /// Loads settings from `SLUICE_CONFIG_PATH` (default `config/default.toml`,
    /// optional) overlaid with `SLUICE_*` environment variables.
    pub fn new() -> Result<Self, config::ConfigError> {
        let config_file_path = std::env::var("SLUICE_CONFIG_PATH")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::from_path(&config_file_path)
    }

    pub fn from_path(path: &str) -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SLUICE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}

impl AnalyzeSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
