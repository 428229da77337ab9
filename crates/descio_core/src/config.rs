use std::path::Path;

use serde::Deserialize;

use descio_base::error::ErrorKind;
use descio_base::{DescioError, DescioResult, EmulationConfig};

/// Configuration for the descio layer.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Path-mapper settings. Absent means the platform-default mapper.
    #[serde(default)]
    pub mapper: Option<MapperConfig>,
}

/// Settings for the emulation path mapper.
#[derive(Debug, Clone, Deserialize)]
pub struct MapperConfig {
    /// Mount prefix under which native drives appear.
    #[serde(default = "default_mount_prefix")]
    pub mount_prefix: String,
    /// Environment variables consulted, in order, for the native temp
    /// directory that replaces `/tmp`.
    #[serde(default = "default_temp_env")]
    pub temp_env: Vec<String>,
}

fn default_mount_prefix() -> String {
    "/cygdrive/".to_string()
}

fn default_temp_env() -> Vec<String> {
    vec!["TMP".to_string(), "TEMP".to_string()]
}

impl From<MapperConfig> for EmulationConfig {
    fn from(config: MapperConfig) -> Self {
        EmulationConfig {
            mount_prefix: config.mount_prefix,
            temp_env_vars: config.temp_env,
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> DescioResult<Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Box::new(DescioError::new(ErrorKind::FileError {
            path: path.to_path_buf(),
            source: e,
        }))
    })?;
    parse_config(&text)
}

/// Parse configuration from TOML text.
pub fn parse_config(text: &str) -> DescioResult<Config> {
    toml::from_str(text)
        .map_err(|e| Box::new(DescioError::message(format!("invalid configuration: {}", e))))
}
