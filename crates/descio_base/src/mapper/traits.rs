use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::error::DescioResult;

use super::emulation::{EmulationConfig, EmulationMapper};
use super::identity::IdentityMapper;

/// Translates a POSIX-style descriptor path into the native path used to
/// actually open the file.
///
/// Two implementations are provided:
/// - `IdentityMapper`: pass-through, for platforms without the duality
/// - `EmulationMapper`: cygwin-convention translation for POSIX emulation
///   layers hosted on a native OS
pub trait PathMapper: fmt::Debug + Send + Sync + 'static {
    /// Map a descriptor path to the native path to open.
    ///
    /// # Errors
    /// Returns an error when the path is recognized but cannot be
    /// translated (an unsupported `/dev/*` path, or a `/tmp` path with no
    /// temp directory configured). The caller treats this as an open
    /// failure for that descriptor.
    fn map(&self, path: &str) -> DescioResult<PathBuf>;
}

/// Handle to a path mapper implementation, enabling shared ownership.
///
/// Internally wraps `Arc<dyn PathMapper>` for cheap cloning and
/// thread-safe sharing.
#[derive(Debug, Clone)]
pub struct PathMapperHandle(Arc<dyn PathMapper>);

impl PathMapperHandle {
    /// Create a new PathMapperHandle from a PathMapper implementation.
    pub fn new(mapper: impl PathMapper + 'static) -> Self {
        Self(Arc::new(mapper))
    }

    /// The mapper matching the runtime target: emulation translation on
    /// Windows hosts, identity everywhere else.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::new(EmulationMapper::new(EmulationConfig::default()))
        } else {
            Self::new(IdentityMapper)
        }
    }
}

impl std::ops::Deref for PathMapperHandle {
    type Target = dyn PathMapper;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

static PATH_MAPPER: OnceLock<PathMapperHandle> = OnceLock::new();

/// The process-wide path mapper.
///
/// Defaults to [`PathMapperHandle::platform_default`] on first use if
/// nothing was installed.
pub fn path_mapper() -> &'static PathMapperHandle {
    PATH_MAPPER.get_or_init(PathMapperHandle::platform_default)
}

/// Install the process-wide path mapper. Call once at startup, before any
/// descriptor is opened.
///
/// # Errors
/// Fails if a mapper was already installed (or already defaulted).
pub fn install_path_mapper(handle: PathMapperHandle) -> DescioResult<()> {
    PATH_MAPPER
        .set(handle)
        .map_err(|_| crate::err!("path mapper already installed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_cheaply_cloneable() {
        let handle = PathMapperHandle::new(IdentityMapper);
        let clone = handle.clone();
        assert_eq!(
            clone.map("some/path").unwrap(),
            PathBuf::from("some/path")
        );
    }

    #[test]
    fn platform_default_maps_relative_paths_unchanged() {
        let handle = PathMapperHandle::platform_default();
        assert_eq!(handle.map("data/in.txt").unwrap(), PathBuf::from("data/in.txt"));
    }
}
