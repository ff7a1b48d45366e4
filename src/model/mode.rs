/// Application interaction modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Accepting commands and kernel versions.
    #[default]
    Input,
    /// A dependency installation is running on the worker thread.
    Busy,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Input => "INPUT",
            Mode::Busy => "BUSY",
        }
    }
}
