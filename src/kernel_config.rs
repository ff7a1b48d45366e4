//! Kernel `.config` management.
//!
//! Applies a set of `CONFIG_*` changes to a kernel source tree and lets
//! `make olddefconfig` resolve their dependencies, restoring the previous
//! file when anything goes wrong.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::distro::OperationResult;
use crate::process::{CommandRunner, CommandSpec};

const DEFCONFIG_TIMEOUT: Duration = Duration::from_secs(300);
const OLDDEFCONFIG_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_STATUS: usize = 10;
const SHOWN_STATUS: usize = 5;

/// Files of which at least one must exist in a kernel source tree.
const SOURCE_MARKERS: [&str; 3] = ["Kconfig", "Makefile", "init"];

const HEADER: &str = "#\n# Automatically generated file; DO NOT EDIT.\n#\n# Kernel configuration\n#\n\n";

pub struct KernelConfig {
    source_dir: PathBuf,
    version: String,
    config_path: PathBuf,
    backup_path: PathBuf,
    status: VecDeque<String>,
}

impl KernelConfig {
    pub fn new(source_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        let source_dir = source_dir.into();
        Self {
            config_path: source_dir.join(".config"),
            backup_path: source_dir.join(".config.backup"),
            source_dir,
            version: version.into(),
            status: VecDeque::new(),
        }
    }

    /// The most recent status lines, oldest first.
    pub fn status_lines(&self) -> Vec<String> {
        let skip = self.status.len().saturating_sub(SHOWN_STATUS);
        self.status.iter().skip(skip).cloned().collect()
    }

    fn add_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(kernel = %self.version, "{message}");
        self.status.push_back(message);
        while self.status.len() > MAX_STATUS {
            self.status.pop_front();
        }
    }

    pub fn validate_source(&mut self) -> bool {
        if !self.source_dir.is_dir() {
            self.add_status(format!(
                "Error: Kernel source directory not found: {}",
                self.source_dir.display()
            ));
            return false;
        }

        if !SOURCE_MARKERS
            .iter()
            .any(|marker| self.source_dir.join(marker).exists())
        {
            self.add_status("Error: Directory does not appear to contain kernel source");
            return false;
        }

        self.add_status(format!("Valid kernel source: {}", self.source_dir.display()));
        true
    }

    /// Generate a default `.config` with `make defconfig` when none exists.
    pub fn ensure_config_exists(&mut self, runner: &dyn CommandRunner) -> bool {
        if self.config_path.exists() {
            self.add_status("Found existing .config file");
            return true;
        }

        self.add_status("No .config found, running 'make defconfig'...");
        let result = self.make(runner, "defconfig", DEFCONFIG_TIMEOUT);
        if result.success {
            self.add_status("Successfully generated default config");
        }
        result.success
    }

    pub fn backup(&mut self) -> bool {
        if !self.config_path.exists() {
            return false;
        }

        match fs::copy(&self.config_path, &self.backup_path) {
            Ok(_) => {
                self.add_status("Created backup of .config");
                true
            }
            Err(err) => {
                self.add_status(format!("Failed to backup config: {err}"));
                false
            }
        }
    }

    pub fn restore(&mut self) -> bool {
        if !self.backup_path.exists() {
            return false;
        }

        match fs::copy(&self.backup_path, &self.config_path) {
            Ok(_) => {
                self.add_status("Restored .config from backup");
                true
            }
            Err(err) => {
                self.add_status(format!("Failed to restore config: {err}"));
                false
            }
        }
    }

    /// Parse `.config` into an ordered map. A missing file reads as empty.
    pub fn read(&mut self) -> Result<BTreeMap<String, String>> {
        if !self.config_path.exists() {
            return Ok(BTreeMap::new());
        }

        let text = fs::read_to_string(&self.config_path)
            .with_context(|| format!("reading {}", self.config_path.display()))?;
        let entries = parse_config(&text);
        self.add_status(format!("Read {} config options", entries.len()));
        Ok(entries)
    }

    pub fn write(&mut self, entries: &BTreeMap<String, String>) -> Result<()> {
        fs::write(&self.config_path, render_config(entries))
            .with_context(|| format!("writing {}", self.config_path.display()))?;
        self.add_status(format!("Successfully wrote {} config options", entries.len()));
        Ok(())
    }

    pub fn modify(&mut self, changes: &BTreeMap<String, String>) -> Result<()> {
        anyhow::ensure!(self.config_path.exists(), "no config file to modify");

        let mut entries = self.read()?;
        for (key, value) in changes {
            entries.insert(key.clone(), value.clone());
            self.add_status(format!("Set {key}={value}"));
        }
        self.write(&entries)
    }

    pub fn run_olddefconfig(&mut self, runner: &dyn CommandRunner) -> OperationResult {
        self.add_status("Running 'make olddefconfig' to resolve dependencies...");
        let result = self.make(runner, "olddefconfig", OLDDEFCONFIG_TIMEOUT);
        if result.success {
            let message = "Successfully resolved config dependencies";
            self.add_status(message);
            return OperationResult::ok(message);
        }
        result
    }

    /// Validate, ensure, back up, modify, resolve. Restores the backup if
    /// modification or resolution fails.
    pub fn apply_changes(
        &mut self,
        runner: &dyn CommandRunner,
        changes: &BTreeMap<String, String>,
    ) -> OperationResult {
        self.add_status(format!("Applying config changes for kernel {}", self.version));

        if !self.validate_source() {
            return OperationResult::failed("Invalid kernel source directory");
        }

        if !self.ensure_config_exists(runner) {
            return OperationResult::failed("Failed to create initial config");
        }

        self.backup();

        if let Err(err) = self.modify(changes) {
            self.add_status(format!("Error modifying config: {err:#}"));
            self.restore();
            return OperationResult::failed("Failed to apply config changes");
        }

        let resolved = self.run_olddefconfig(runner);
        if !resolved.success {
            self.restore();
            return OperationResult::failed(format!(
                "Config validation failed: {}",
                resolved.message
            ));
        }

        OperationResult::ok("Successfully applied and validated config changes")
    }

    fn make(&mut self, runner: &dyn CommandRunner, target: &str, timeout: Duration) -> OperationResult {
        let spec = CommandSpec::new("make")
            .arg(target)
            .current_dir(&self.source_dir)
            .timeout(timeout);

        let result = match runner.run(&spec) {
            Ok(output) if output.success() => OperationResult::ok(format!("make {target} succeeded")),
            Ok(output) => {
                OperationResult::failed(format!("make {target} failed: {}", output.diagnostic()))
            }
            Err(err) => OperationResult::failed(format!("Error running make {target}: {err}")),
        };

        if !result.success {
            tracing::warn!(kernel = %self.version, "{}", result.message);
            self.add_status(result.message.clone());
        }
        result
    }
}

fn parse_config(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn render_config(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::from(HEADER);
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::RecordingRunner;

    fn kernel_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), "VERSION = 6\n").unwrap();
        dir
    }

    fn changes(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_skips_comments_and_splits_on_first_equals() {
        let parsed = parse_config(
            "#\n# CONFIG_FOO is not set\n// legacy\nCONFIG_A=y\n CONFIG_CMDLINE=\"a=b\" \n\nnot a pair\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["CONFIG_A"], "y");
        assert_eq!(parsed["CONFIG_CMDLINE"], "\"a=b\"");
    }

    #[test]
    fn render_sorts_keys_under_header() {
        let rendered = render_config(&changes(&[("CONFIG_Z", "m"), ("CONFIG_A", "y")]));
        assert!(rendered.starts_with(HEADER));
        assert!(rendered.ends_with("CONFIG_A=y\nCONFIG_Z=m\n"));
    }

    #[test]
    fn rejects_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::succeeding();
        let mut config = KernelConfig::new(dir.path().join("linux-6.16"), "6.16");

        let result = config.apply_changes(&runner, &BTreeMap::new());
        assert_eq!(result, OperationResult::failed("Invalid kernel source directory"));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn rejects_directory_without_kernel_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KernelConfig::new(dir.path(), "6.16");
        assert!(!config.validate_source());
        assert!(
            config
                .status_lines()
                .last()
                .is_some_and(|s| s.contains("does not appear to contain kernel source"))
        );
    }

    #[test]
    fn runs_defconfig_when_config_is_missing() {
        let dir = kernel_tree();
        let runner = RecordingRunner::failing_when("defconfig", "No rule to make target");
        let mut config = KernelConfig::new(dir.path(), "6.16");

        let result = config.apply_changes(&runner, &BTreeMap::new());
        assert_eq!(result, OperationResult::failed("Failed to create initial config"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["defconfig"]);
        assert_eq!(calls[0].cwd.as_deref(), Some(dir.path()));
        assert_eq!(calls[0].timeout, Some(DEFCONFIG_TIMEOUT));
        assert!(!calls[0].elevated);
    }

    #[test]
    fn applies_changes_and_resolves_dependencies() {
        let dir = kernel_tree();
        fs::write(dir.path().join(".config"), "CONFIG_A=y\nCONFIG_B=m\n").unwrap();
        let runner = RecordingRunner::succeeding();
        let mut config = KernelConfig::new(dir.path(), "6.16");

        let result = config.apply_changes(
            &runner,
            &changes(&[("CONFIG_B", "y"), ("CONFIG_LOCALVERSION", "\"-tkt\"")]),
        );
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "Successfully applied and validated config changes");

        let written = config.read().unwrap();
        assert_eq!(written["CONFIG_A"], "y");
        assert_eq!(written["CONFIG_B"], "y");
        assert_eq!(written["CONFIG_LOCALVERSION"], "\"-tkt\"");
        assert!(dir.path().join(".config.backup").exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["olddefconfig"]);
    }

    #[test]
    fn restores_backup_when_olddefconfig_fails() {
        let dir = kernel_tree();
        let original = "CONFIG_A=y\n";
        fs::write(dir.path().join(".config"), original).unwrap();
        let runner = RecordingRunner::failing_when("olddefconfig", "Kconfig syntax error");
        let mut config = KernelConfig::new(dir.path(), "6.16");

        let result = config.apply_changes(&runner, &changes(&[("CONFIG_A", "n")]));
        assert!(!result.success);
        assert_eq!(
            result.message,
            "Config validation failed: make olddefconfig failed: Kconfig syntax error"
        );
        assert_eq!(fs::read_to_string(dir.path().join(".config")).unwrap(), original);
    }

    #[test]
    fn status_history_is_bounded() {
        let mut config = KernelConfig::new("/nonexistent", "6.16");
        for i in 0..25 {
            config.add_status(format!("line {i}"));
        }
        assert_eq!(config.status.len(), MAX_STATUS);
        assert_eq!(
            config.status_lines(),
            vec!["line 20", "line 21", "line 22", "line 23", "line 24"]
        );
    }
}
