use super::backend::{DistroBackend, OperationResult, dependency_set, run_step};
use super::registry::BackendKind;
use crate::process::{CommandRunner, CommandSpec};

/// Packages Debian needs on top of the base list.
pub const DEBIAN_DEPENDENCIES: &[&str] = &[
    "binutils",
    "binutils-dev",
    "binutils-gold",
    "build-essential",
    "debhelper",
    "device-tree-compiler",
    "dpkg-dev",
    "dwarves",
    "fakeroot",
    "g++",
    "g++-multilib",
    "gcc",
    "gcc-multilib",
    "gnupg",
    "libc6-dev",
    "libc6-dev-i386",
    "libdw-dev",
    "libelf-dev",
    "libncurses-dev",
    "libnuma-dev",
    "libperl-dev",
    "libssl-dev",
    "libstdc++-14-dev",
    "libudev-dev",
    "ninja-build",
    "python3-setuptools",
    "qtbase5-dev",
    "schedtool",
    "xz-utils",
];

/// Ubuntu currently installs exactly what Debian does.
pub const UBUNTU_DEPENDENCIES: &[&str] = DEBIAN_DEPENDENCIES;

/// apt-based backend.
#[derive(Debug, Clone)]
pub struct DebianBackend {
    label: &'static str,
    packages: Vec<String>,
}

impl DebianBackend {
    pub fn new() -> Self {
        Self::with_packages("Debian", dependency_set(DEBIAN_DEPENDENCIES))
    }

    /// The apt command set under another distribution's name and package list.
    fn with_packages(label: &'static str, packages: Vec<String>) -> Self {
        Self { label, packages }
    }

    fn apt_get(&self) -> CommandSpec {
        CommandSpec::new("apt-get").elevated()
    }
}

impl Default for DebianBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DistroBackend for DebianBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Debian
    }

    fn dependencies(&self) -> &[String] {
        &self.packages
    }

    fn refresh_repositories(&self, runner: &dyn CommandRunner) -> OperationResult {
        let spec = self.apt_get().args(["update", "-y"]);
        run_step(runner, &format!("Updating {} repositories", self.label), &spec)
    }

    fn install_packages(&self, runner: &dyn CommandRunner) -> OperationResult {
        let spec = self
            .apt_get()
            .args(["install", "-y"])
            .args(self.packages.iter().cloned());
        run_step(runner, &format!("Installing {} packages", self.label), &spec)
    }
}

/// Ubuntu delegates to the Debian command set with its own package list.
#[derive(Debug, Clone)]
pub struct UbuntuBackend {
    apt: DebianBackend,
}

impl UbuntuBackend {
    pub fn new() -> Self {
        Self {
            apt: DebianBackend::with_packages("Ubuntu", dependency_set(UBUNTU_DEPENDENCIES)),
        }
    }
}

impl Default for UbuntuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DistroBackend for UbuntuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ubuntu
    }

    fn dependencies(&self) -> &[String] {
        self.apt.dependencies()
    }

    fn refresh_repositories(&self, runner: &dyn CommandRunner) -> OperationResult {
        self.apt.refresh_repositories(runner)
    }

    fn install_packages(&self, runner: &dyn CommandRunner) -> OperationResult {
        self.apt.install_packages(runner)
    }
}
