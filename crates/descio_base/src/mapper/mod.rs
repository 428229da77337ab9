//! Platform path mapping.
//!
//! Descriptors name files with POSIX-style paths. On platforms where the
//! native filesystem differs (a POSIX-emulation layer over a native OS),
//! those paths must be translated before they reach `std::fs`. The
//! `PathMapper` trait is that seam: `EmulationMapper` performs the
//! translation, `IdentityMapper` is the no-op used everywhere else, and
//! the implementation is selected once at process start.

mod emulation;
mod identity;
mod traits;

pub use emulation::{EmulationConfig, EmulationMapper};
pub use identity::IdentityMapper;
pub use traits::{PathMapper, PathMapperHandle, install_path_mapper, path_mapper};
