//! Identifier → backend resolution.
//!
//! [`BackendKind::ALL`] is the only list of supported distributions: the
//! resolver walks it and the UI displays it.

use std::fmt;

use super::arch::ArchBackend;
use super::backend::DistroBackend;
use super::debian::{DebianBackend, UbuntuBackend};
use super::detect::DistributionId;
use super::error::UnsupportedDistributionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Arch,
    Debian,
    Ubuntu,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [BackendKind::Arch, BackendKind::Debian, BackendKind::Ubuntu];

    /// The os-release `ID` this backend serves.
    pub fn id(self) -> &'static str {
        match self {
            BackendKind::Arch => "arch",
            BackendKind::Debian => "debian",
            BackendKind::Ubuntu => "ubuntu",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BackendKind::Arch => "Arch",
            BackendKind::Debian => "Debian",
            BackendKind::Ubuntu => "Ubuntu",
        }
    }

    pub fn backend_name(self) -> &'static str {
        match self {
            BackendKind::Arch => "ArchBackend",
            BackendKind::Debian => "DebianBackend",
            BackendKind::Ubuntu => "UbuntuBackend",
        }
    }

    /// Exact, case-insensitive lookup. No prefix or substring matching.
    pub fn from_id(identifier: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(identifier))
    }

    pub fn build(self) -> Box<dyn DistroBackend> {
        match self {
            BackendKind::Arch => Box::new(ArchBackend::new()),
            BackendKind::Debian => Box::new(DebianBackend::new()),
            BackendKind::Ubuntu => Box::new(UbuntuBackend::new()),
        }
    }

    pub fn supported_ids() -> Vec<&'static str> {
        Self::ALL.into_iter().map(Self::id).collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_name())
    }
}

pub fn resolve_backend(
    identifier: &DistributionId,
) -> Result<Box<dyn DistroBackend>, UnsupportedDistributionError> {
    match BackendKind::from_id(identifier.as_str()) {
        Some(kind) => {
            tracing::info!(distribution = %identifier, backend = %kind, "resolved backend");
            Ok(kind.build())
        }
        None => {
            tracing::info!(distribution = %identifier, "no backend registered");
            Err(UnsupportedDistributionError {
                identifier: identifier.to_string(),
            })
        }
    }
}
