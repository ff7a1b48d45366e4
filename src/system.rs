//! The operation coordinator: detects the host once, holds whichever backend
//! it resolved to, and runs operations against it.

use std::collections::BTreeMap;
use std::path::Path;

use crate::distro::{
    BackendKind, DistributionId, DistroBackend, OperationResult, OsRelease, PlatformError,
    detect_distribution, resolve_backend,
};
use crate::kernel_config::KernelConfig;
use crate::process::CommandRunner;

enum Resolution {
    Ready(Box<dyn DistroBackend>),
    Unsupported { reason: String },
}

/// Read-only snapshot for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    /// Detected identifier, or `unknown`.
    pub distribution: String,
    pub supported: bool,
    pub backend_name: Option<&'static str>,
    pub pretty_name: Option<String>,
    /// Why no backend was loaded.
    pub failure: Option<String>,
    pub id_like: Vec<String>,
}

pub struct SystemManager {
    distribution: Option<DistributionId>,
    release: OsRelease,
    resolution: Resolution,
    runner: Box<dyn CommandRunner>,
}

impl SystemManager {
    /// Detect the host distribution and resolve its backend. Never fails;
    /// detection and resolution errors are kept as state.
    pub fn new(runner: impl CommandRunner + 'static) -> Self {
        let (detected, release) = match detect_distribution() {
            Ok((id, release)) => (Ok(id), release),
            Err(err) => (Err(err), OsRelease::default()),
        };
        Self::resolve(detected, release, runner)
    }

    pub fn resolve(
        detected: Result<DistributionId, PlatformError>,
        release: OsRelease,
        runner: impl CommandRunner + 'static,
    ) -> Self {
        let (distribution, resolution) = match detected {
            Ok(id) => {
                let resolution = match resolve_backend(&id) {
                    Ok(backend) => Resolution::Ready(backend),
                    Err(err) => Resolution::Unsupported {
                        reason: err.to_string(),
                    },
                };
                (Some(id), resolution)
            }
            Err(err) => {
                tracing::warn!("distribution detection failed: {err}");
                (
                    None,
                    Resolution::Unsupported {
                        reason: err.to_string(),
                    },
                )
            }
        };

        Self {
            distribution,
            release,
            resolution,
            runner: Box::new(runner),
        }
    }

    #[cfg(test)]
    pub fn for_distribution(id: &str, runner: impl CommandRunner + 'static) -> Self {
        Self::resolve(Ok(DistributionId::new(id)), OsRelease::default(), runner)
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.resolution, Resolution::Ready(_))
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        match &self.resolution {
            Resolution::Ready(backend) => Some(backend.name()),
            Resolution::Unsupported { .. } => None,
        }
    }

    fn distribution_label(&self) -> String {
        self.distribution
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string)
    }

    pub fn status(&self) -> SystemStatus {
        let failure = match &self.resolution {
            Resolution::Ready(_) => None,
            Resolution::Unsupported { reason } => Some(reason.clone()),
        };

        SystemStatus {
            distribution: self.distribution_label(),
            supported: self.is_supported(),
            backend_name: self.backend_name(),
            pretty_name: self.release.pretty_name.clone(),
            failure,
            id_like: self.release.id_like.clone(),
        }
    }

    /// Refresh repositories and install the build dependencies. Unsupported
    /// hosts get a failed result without any process being started.
    pub fn install_dependencies(&self) -> OperationResult {
        match &self.resolution {
            Resolution::Ready(backend) => {
                tracing::info!(backend = backend.name(), "installing dependencies");
                backend.update_and_install(self.runner.as_ref())
            }
            Resolution::Unsupported { .. } => OperationResult::failed(format!(
                "{} is not supported for automatic dependency installation",
                self.distribution_label()
            )),
        }
    }

    pub fn prepare_kernel_source(&self, version: &str) -> OperationResult {
        tracing::info!(kernel = version, "source preparation requested");
        OperationResult::failed(format!(
            "Preparing kernel {version} source is not automated; download and unpack it manually"
        ))
    }

    pub fn configure_kernel(
        &self,
        source_dir: &Path,
        version: &str,
        changes: &BTreeMap<String, String>,
    ) -> OperationResult {
        let mut config = KernelConfig::new(source_dir, version);
        let result = config.apply_changes(self.runner.as_ref(), changes);
        for line in config.status_lines() {
            tracing::info!(kernel = version, "{line}");
        }
        result
    }
}

/// Human-readable list of what can be resolved, for unsupported hosts.
pub fn supported_distributions() -> String {
    BackendKind::supported_ids().join(", ")
}
