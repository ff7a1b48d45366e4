use thiserror::Error;

/// The host cannot be classified at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("host operating system is {os}, not Linux")]
    NotLinux { os: String },

    #[error("cannot get distribution name: {reason}")]
    Undetermined { reason: String },
}

/// The host was identified but no backend is registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported distribution: '{identifier}'")]
pub struct UnsupportedDistributionError {
    pub identifier: String,
}
