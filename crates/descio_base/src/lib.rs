//! Foundation crate for the descio toolkit: the shared error type, the
//! defect (abort) path, tracing setup, and the platform path mapper.

pub mod error;
pub mod mapper;
pub mod tracing;

// Re-export commonly used types for convenience
pub use error::{DescioError, DescioResult, ErrorKind, ResultExt};
pub use mapper::{
    EmulationConfig, EmulationMapper, IdentityMapper, PathMapper, PathMapperHandle,
    install_path_mapper, path_mapper,
};
