//! External command execution.
//!
//! Everything that touches the host's package manager or the kernel build
//! system goes through [`CommandRunner`], so callers can be exercised without
//! spawning real processes.

use std::fmt;
use std::path::PathBuf;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

use duct::cmd;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long a timed-out command gets to exit after SIGTERM before the whole
/// process group is killed.
#[cfg(unix)]
const TERM_GRACE: Duration = Duration::from_secs(5);

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Run through the configured privilege escalation tool unless already root.
    pub elevated: bool,
    pub cwd: Option<PathBuf>,
    /// Overrides the runner's default timeout.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            elevated: false,
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status and captured streams of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best available explanation of a failure: stderr, then stdout, then the
    /// exit status.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }

        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }

        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<&Output> for CommandOutput {
    fn from(output: &Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{program} was not found in PATH")]
    NotFound { program: String },

    #[error("privilege escalation tool '{tool}' is not available")]
    EscalationUnavailable { tool: String },

    #[error("{program} did not finish within {}s and was terminated", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs a [`CommandSpec`] to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError>;
}

/// Runs commands on the host through `duct`, escalating with a
/// non-interactive `sudo -n` (or equivalent) when required.
///
/// Each command is started in its own process group. On timeout the group
/// gets SIGTERM, which `sudo` relays to the command it runs as root, and
/// SIGKILL once the grace period is over.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    privilege_tool: String,
    default_timeout: Duration,
    running_as_root: fn() -> bool,
}

fn running_as_root() -> bool {
    matches!(sudo::check(), sudo::RunningAs::Root)
}

impl SystemRunner {
    pub fn new(privilege_tool: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            privilege_tool: privilege_tool.into(),
            default_timeout,
            running_as_root,
        }
    }

    #[cfg(test)]
    fn with_root_check(mut self, check: fn() -> bool) -> Self {
        self.running_as_root = check;
        self
    }

    fn argv(&self, spec: &CommandSpec) -> Result<(String, Vec<String>), RunError> {
        if which::which(&spec.program).is_err() {
            return Err(RunError::NotFound {
                program: spec.program.clone(),
            });
        }

        if !spec.elevated || (self.running_as_root)() {
            return Ok((spec.program.clone(), spec.args.clone()));
        }

        if which::which(&self.privilege_tool).is_err() {
            return Err(RunError::EscalationUnavailable {
                tool: self.privilege_tool.clone(),
            });
        }

        // The TUI owns the terminal, so a password prompt would hang; -n makes
        // the tool fail fast with its own message instead.
        let mut args = vec!["-n".to_string(), spec.program.clone()];
        args.extend(spec.args.iter().cloned());
        Ok((self.privilege_tool.clone(), args))
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new("sudo", Duration::from_secs(3600))
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        let (program, args) = self.argv(spec)?;
        let timeout = spec.timeout.unwrap_or(self.default_timeout);

        tracing::info!(command = %spec, elevated = spec.elevated, "running command");

        let mut expr = cmd(program.as_str(), &args)
            .stdin_null()
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        if let Some(dir) = &spec.cwd {
            expr = expr.dir(dir);
        }
        #[cfg(unix)]
        {
            expr = expr.before_spawn(|command| {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
                Ok(())
            });
        }

        let io_err = |source: std::io::Error| RunError::Io {
            program: spec.program.clone(),
            source,
        };

        let handle = expr.start().map_err(io_err)?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(output) = handle.try_wait().map_err(io_err)? {
                let output = CommandOutput::from(output);
                if !output.success() {
                    tracing::warn!(
                        command = %spec,
                        code = ?output.code,
                        "command failed: {}",
                        output.diagnostic()
                    );
                }
                return Ok(output);
            }

            if Instant::now() >= deadline {
                tracing::warn!(command = %spec, "command timed out after {}s", timeout.as_secs());
                terminate(&handle, spec);
                return Err(RunError::TimedOut {
                    program: spec.program.clone(),
                    timeout,
                });
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Stop a timed-out command and everything it started, then reap it.
#[cfg(unix)]
fn terminate(handle: &duct::Handle, spec: &CommandSpec) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // The leader's pid is the group id, see `process_group(0)` above.
    let groups: Vec<Pid> = handle
        .pids()
        .into_iter()
        .map(|pid| Pid::from_raw(pid as i32))
        .collect();

    let signal_all = |signal: Signal| {
        for &group in &groups {
            match killpg(group, signal) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(err) => tracing::warn!("failed to send {signal:?} to {}: {err}", spec.program),
            }
        }
    };

    signal_all(Signal::SIGTERM);

    let grace = Instant::now() + TERM_GRACE;
    while Instant::now() < grace {
        match handle.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                tracing::warn!("failed to poll {}: {err}", spec.program);
                break;
            }
        }
    }

    // Stragglers that ignored SIGTERM or outlived the leader.
    signal_all(Signal::SIGKILL);

    if let Err(err) = handle.kill() {
        tracing::error!("failed to terminate {}: {err}", spec.program);
    }
}

#[cfg(not(unix))]
fn terminate(handle: &duct::Handle, spec: &CommandSpec) {
    if let Err(err) = handle.kill() {
        tracing::error!("failed to terminate {}: {err}", spec.program);
    }
}
