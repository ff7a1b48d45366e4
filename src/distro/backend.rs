use std::fmt;

use super::registry::BackendKind;
use crate::process::{CommandRunner, CommandSpec};

/// Build tools every backend installs, ahead of its own extension list.
pub const BASE_DEPENDENCIES: &[&str] = &[
    "bash",
    "bc",
    "bison",
    "ccache",
    "cmake",
    "cpio",
    "curl",
    "flex",
    "git",
    "kmod",
    "lz4",
    "make",
    "patchutils",
    "perl",
    "python3",
    "python3-pip",
    "rsync",
    "sudo",
    "tar",
    "time",
    "wget",
    "zstd",
];

/// Outcome of a package-management or coordinator-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.success { '✓' } else { '✗' };
        write!(f, "{marker} {}", self.message)
    }
}

/// A package-management strategy for one distribution family.
///
/// Implementors provide both discrete steps; [`update_and_install`] chains
/// them and may be overridden where the package manager has a combined
/// command.
///
/// [`update_and_install`]: DistroBackend::update_and_install
pub trait DistroBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// The full dependency set: base list followed by the extension list.
    fn dependencies(&self) -> &[String];

    fn refresh_repositories(&self, runner: &dyn CommandRunner) -> OperationResult;

    fn install_packages(&self, runner: &dyn CommandRunner) -> OperationResult;

    fn name(&self) -> &'static str {
        self.kind().backend_name()
    }

    /// Refresh, then install. Stops at the first failing step and returns
    /// that step's result.
    fn update_and_install(&self, runner: &dyn CommandRunner) -> OperationResult {
        let refreshed = self.refresh_repositories(runner);
        if !refreshed.success {
            return refreshed;
        }

        let installed = self.install_packages(runner);
        if !installed.success {
            return installed;
        }

        OperationResult::ok(format!(
            "{} dependencies installed successfully",
            self.kind().display_name()
        ))
    }
}

/// Base dependencies followed by `extension`, in order.
pub fn dependency_set(extension: &[&str]) -> Vec<String> {
    BASE_DEPENDENCIES
        .iter()
        .chain(extension)
        .map(|pkg| pkg.to_string())
        .collect()
}

/// Run one step and describe it. `action` names what was attempted, e.g.
/// "Updating Debian repositories".
pub(crate) fn run_step(
    runner: &dyn CommandRunner,
    action: &str,
    spec: &CommandSpec,
) -> OperationResult {
    tracing::info!("{action}: {spec}");

    match runner.run(spec) {
        Ok(output) if output.success() => OperationResult::ok(format!("{action} succeeded")),
        Ok(output) => {
            let detail = output.diagnostic();
            tracing::warn!("{action} failed: {detail}");
            OperationResult::failed(format!("{action} failed: {detail}"))
        }
        Err(err) => {
            tracing::warn!("{action} failed: {err}");
            OperationResult::failed(format!("{action} failed: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    struct TwoStep;

    impl DistroBackend for TwoStep {
        fn kind(&self) -> BackendKind {
            BackendKind::Debian
        }

        fn dependencies(&self) -> &[String] {
            &[]
        }

        fn refresh_repositories(&self, runner: &dyn CommandRunner) -> OperationResult {
            run_step(runner, "Refreshing", &CommandSpec::new("refresh"))
        }

        fn install_packages(&self, runner: &dyn CommandRunner) -> OperationResult {
            run_step(runner, "Installing", &CommandSpec::new("install"))
        }
    }

    #[test]
    fn dependency_set_starts_with_base_list() {
        let deps = dependency_set(&["extra-one", "extra-two"]);
        assert_eq!(deps.len(), BASE_DEPENDENCIES.len() + 2);
        assert_eq!(&deps[..BASE_DEPENDENCIES.len()], BASE_DEPENDENCIES);
        assert_eq!(deps.last().map(String::as_str), Some("extra-two"));
    }

    #[test]
    fn default_composite_runs_both_steps_in_order() {
        let runner = RecordingRunner::succeeding();
        let result = TwoStep.update_and_install(&runner);

        assert!(result.success);
        assert!(result.message.contains("successfully"));
        let programs: Vec<String> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["refresh", "install"]);
    }

    #[test]
    fn install_failure_is_reported_after_successful_refresh() {
        let runner = RecordingRunner::failing_when("install", "package foo does not exist");
        let result = TwoStep.update_and_install(&runner);

        assert!(!result.success);
        assert_eq!(result.message, "Installing failed: package foo does not exist");
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn runner_errors_become_failed_results() {
        let runner = RecordingRunner::without_escalation();
        let result = run_step(&runner, "Updating Arch repositories", &CommandSpec::new("pacman"));

        assert!(!result.success);
        assert!(result.message.starts_with("Updating Arch repositories failed"));
        assert!(result.message.contains("sudo"));
    }

    #[test]
    fn display_marks_outcome() {
        assert_eq!(OperationResult::ok("done").to_string(), "✓ done");
        assert_eq!(OperationResult::failed("nope").to_string(), "✗ nope");
    }
}
