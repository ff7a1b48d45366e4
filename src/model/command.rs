//! Parsing of the single input line into a command.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InstallDeps,
    Prepare(String),
    Configure(PathBuf),
    Status,
    Help,
    Quit,
    SelectKernel(String),
    Empty,
}

impl Command {
    /// Keywords match case-insensitively; anything else is a kernel version.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Command::Empty;
        }

        if let Some((keyword, arg)) = input.split_once(':') {
            let arg = arg.trim();
            match keyword.trim().to_ascii_lowercase().as_str() {
                "prepare" if !arg.is_empty() => return Command::Prepare(arg.to_string()),
                "config" if !arg.is_empty() => return Command::Configure(PathBuf::from(arg)),
                _ => {}
            }
        }

        match input.to_ascii_lowercase().as_str() {
            "deps" | "install-deps" => Command::InstallDeps,
            "status" => Command::Status,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => Command::SelectKernel(input.to_string()),
        }
    }
}

/// Outcome of picking a kernel version against the configured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(String),
    NotAvailable(String),
}

impl Selection {
    /// An empty list accepts any version.
    pub fn choose(available: &[String], version: &str) -> Self {
        if available.is_empty() || available.iter().any(|v| v == version) {
            Selection::Selected(version.to_string())
        } else {
            Selection::NotAvailable(version.to_string())
        }
    }

    pub fn message(&self) -> String {
        match self {
            Selection::Selected(v) => format!(" Kernel version {v} selected"),
            Selection::NotAvailable(v) => format!(" Kernel version {v} not in available list"),
        }
    }
}

pub const HELP: &str = "deps: install build dependencies | prepare:<version> | \
config:<source-dir> | status | help | quit  (Ctrl+D deps, Ctrl+Q quit)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(Command::parse("DEPS"), Command::InstallDeps);
        assert_eq!(Command::parse(" Install-Deps "), Command::InstallDeps);
        assert_eq!(Command::parse("Exit"), Command::Quit);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn prefixed_commands_carry_arguments() {
        assert_eq!(Command::parse("prepare:6.16"), Command::Prepare("6.16".to_string()));
        assert_eq!(
            Command::parse("Config: /usr/src/linux-6.16"),
            Command::Configure(PathBuf::from("/usr/src/linux-6.16"))
        );
        assert_eq!(
            Command::parse("prepare:"),
            Command::SelectKernel("prepare:".to_string())
        );
    }

    #[test]
    fn other_input_is_a_version() {
        assert_eq!(Command::parse("6.16"), Command::SelectKernel("6.16".to_string()));
    }

    #[test]
    fn selection_against_list() {
        let available = vec!["6.16".to_string(), "6.15".to_string()];
        assert_eq!(
            Selection::choose(&available, "6.15").message(),
            " Kernel version 6.15 selected"
        );
        assert_eq!(
            Selection::choose(&available, "5.10").message(),
            " Kernel version 5.10 not in available list"
        );
        assert_eq!(
            Selection::choose(&[], "5.10"),
            Selection::Selected("5.10".to_string())
        );
    }
}
