use std::env;
use std::path::PathBuf;

use tracing::{instrument, warn};

use crate::error::DescioResult;

use super::traits::PathMapper;

/// Configuration for [`EmulationMapper`], captured once at construction.
#[derive(Debug, Clone)]
pub struct EmulationConfig {
    /// Mount prefix under which native drives appear, e.g. `/cygdrive/`.
    pub mount_prefix: String,
    /// Environment variables consulted, in order, for the native temp
    /// directory that replaces `/tmp`.
    pub temp_env_vars: Vec<String>,
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            mount_prefix: "/cygdrive/".to_string(),
            temp_env_vars: vec!["TMP".to_string(), "TEMP".to_string()],
        }
    }
}

/// Maps POSIX-emulation paths onto the host's native filesystem.
///
/// Shell scripts running under the emulation layer use its mount table;
/// the full mapping is not available to native programs, so this performs
/// only the simplistic resolution that covers the common conventions:
/// the default mount prefix, `/dev/null`, and `/tmp`. Other rooted paths
/// pass through with a warning.
#[derive(Debug)]
pub struct EmulationMapper {
    mount_prefix: String,
    temp_dir: Option<String>,
    temp_env_vars: Vec<String>,
}

impl EmulationMapper {
    /// Create a mapper, reading the temp directory from the configured
    /// environment variables now rather than at each `map` call.
    pub fn new(config: EmulationConfig) -> Self {
        let temp_dir = config
            .temp_env_vars
            .iter()
            .find_map(|name| env::var(name).ok());
        Self::with_temp_dir(config, temp_dir)
    }

    /// Create a mapper with an explicit temp directory (or none),
    /// bypassing the environment. Used by tests and embedders with their
    /// own configuration source.
    pub fn with_temp_dir(config: EmulationConfig, temp_dir: Option<String>) -> Self {
        Self {
            mount_prefix: config.mount_prefix,
            temp_dir,
            temp_env_vars: config.temp_env_vars,
        }
    }

    fn map_non_tmp(&self, path: &str) -> DescioResult<PathBuf> {
        // UNC, relative, native Windows and empty paths are usable as-is.
        if path.starts_with("//") || !path.starts_with('/') {
            return Ok(PathBuf::from(path));
        }

        if path == "/dev/null" {
            return Ok(PathBuf::from(r"\\.\nul"));
        }
        if path.starts_with("/dev/") {
            return Err(crate::err!(
                "unable to resolve path '{}': only /dev/null is supported here",
                path
            ));
        }

        if let Some(rest) = path.strip_prefix(self.mount_prefix.as_str()) {
            let mut chars = rest.chars();
            if let Some(drive) = chars.next() {
                let remainder = chars.as_str();
                if drive.is_ascii_alphabetic()
                    && (remainder.is_empty() || remainder.starts_with('/'))
                {
                    if remainder.is_empty() {
                        return Ok(PathBuf::from(format!("{}:/", drive)));
                    }
                    return Ok(PathBuf::from(format!("{}:{}", drive, remainder)));
                }
            }
        }

        warn!(
            "unable to map path '{}' onto a native path; passing it through unchanged",
            path
        );
        Ok(PathBuf::from(path))
    }
}

impl PathMapper for EmulationMapper {
    #[instrument(skip(self))]
    fn map(&self, path: &str) -> DescioResult<PathBuf> {
        if path != "/tmp" && !path.starts_with("/tmp/") {
            return self.map_non_tmp(path);
        }
        let Some(temp_dir) = &self.temp_dir else {
            return Err(crate::err!(
                "unable to resolve path '{}': no temporary directory found; set {}",
                path,
                self.temp_env_vars.first().map(String::as_str).unwrap_or("TMP")
            ));
        };
        // The configured temp directory may itself be a POSIX-style path.
        self.map_non_tmp(&format!("{}{}", temp_dir, &path[4..]))
    }
}
