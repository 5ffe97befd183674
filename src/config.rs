use crate::client::DEFAULT_ENDPOINT;
use serde::Deserialize;
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Error reading config {}: {source}", path.display()))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error parsing config: {source}"))]
    Parse { source: toml::de::Error },
}

/// Client settings, read from a TOML file.
///
/// ```toml
/// endpoint = "http://localhost:5000/process"
/// output_dir = "downloads"
/// timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub endpoint: String,
    pub output_dir: PathBuf,
    /// No timeout unless set.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            output_dir: PathBuf::from("."),
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).context(ParseSnafu)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        Self::from_toml_str(&text)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
