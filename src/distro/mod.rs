pub mod arch;
pub mod backend;
pub mod debian;
pub mod detect;
pub mod error;
pub mod registry;

pub use backend::{DistroBackend, OperationResult};
pub use detect::{DistributionId, OsRelease, detect_distribution};
pub use error::PlatformError;
pub use registry::{BackendKind, resolve_backend};
