use super::backend::{DistroBackend, OperationResult, dependency_set, run_step};
use super::registry::BackendKind;
use crate::process::{CommandRunner, CommandSpec};

/// Packages Arch needs on top of the base list.
pub const ARCH_DEPENDENCIES: &[&str] = &[
    "base-devel",
    "clang",
    "inetutils",
    "libelf",
    "lld",
    "llvm",
    "pahole",
    "xmlto",
];

/// pacman-based backend.
///
/// pacman can sync, upgrade and install in one transaction, so the composite
/// operation is a single invocation rather than two steps.
#[derive(Debug, Clone)]
pub struct ArchBackend {
    packages: Vec<String>,
}

impl ArchBackend {
    pub fn new() -> Self {
        Self {
            packages: dependency_set(ARCH_DEPENDENCIES),
        }
    }

    fn pacman(&self) -> CommandSpec {
        CommandSpec::new("pacman").elevated()
    }
}

impl Default for ArchBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DistroBackend for ArchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Arch
    }

    fn dependencies(&self) -> &[String] {
        &self.packages
    }

    fn refresh_repositories(&self, runner: &dyn CommandRunner) -> OperationResult {
        let spec = self.pacman().args(["-Sy", "--noconfirm"]);
        run_step(runner, "Updating Arch repositories", &spec)
    }

    fn install_packages(&self, runner: &dyn CommandRunner) -> OperationResult {
        let spec = self
            .pacman()
            .args(["-S", "--needed", "--noconfirm"])
            .args(self.packages.iter().cloned());
        run_step(runner, "Installing Arch packages", &spec)
    }

    fn update_and_install(&self, runner: &dyn CommandRunner) -> OperationResult {
        let spec = self
            .pacman()
            .args(["-Syu", "--needed", "--noconfirm"])
            .args(self.packages.iter().cloned());

        let result = run_step(
            runner,
            "Updating Arch repositories and installing dependencies",
            &spec,
        );
        if !result.success {
            return result;
        }

        OperationResult::ok("Arch dependencies installed successfully")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    #[test]
    fn composite_is_a_single_pacman_transaction() {
        let runner = RecordingRunner::succeeding();
        let result = ArchBackend::new().update_and_install(&runner);

        assert!(result.success);
        assert_eq!(result.message, "Arch dependencies installed successfully");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "pacman");
        assert!(calls[0].elevated);
        assert_eq!(&calls[0].args[..3], ["-Syu", "--needed", "--noconfirm"]);
        assert!(calls[0].args.iter().any(|a| a == "base-devel"));
    }

    #[test]
    fn combined_failure_names_the_attempt() {
        let runner = RecordingRunner::failing_when("pacman", "error: failed to synchronize all databases");
        let result = ArchBackend::new().update_and_install(&runner);

        assert!(!result.success);
        assert!(result.message.starts_with("Updating Arch repositories"));
        assert!(result.message.contains("failed to synchronize"));
    }

    #[test]
    fn discrete_steps_are_still_available() {
        let runner = RecordingRunner::succeeding();
        let backend = ArchBackend::new();

        assert!(backend.refresh_repositories(&runner).success);
        assert!(backend.install_packages(&runner).success);

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["-Sy", "--noconfirm"]);
        assert_eq!(calls[1].args.len(), 3 + backend.dependencies().len());
    }
}
