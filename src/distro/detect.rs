//! Host distribution detection from os-release data.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use super::error::PlatformError;

/// Primary location first, then the vendor fallback.
pub const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Normalized (trimmed, lowercase) distribution ID, e.g. `arch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionId(String);

impl DistributionId {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The subset of an os-release record this tool cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: Option<String>,
    /// Parent distributions, most specific first.
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
    pub source: Option<PathBuf>,
}

impl OsRelease {
    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());

            match key.trim() {
                "ID" => release.id = Some(value.to_lowercase()).filter(|v| !v.is_empty()),
                "ID_LIKE" => {
                    release.id_like = value.split_whitespace().map(str::to_lowercase).collect();
                }
                "PRETTY_NAME" => release.pretty_name = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        release
    }

    pub fn distribution_id(&self) -> Result<DistributionId, PlatformError> {
        let location = self
            .source
            .as_ref()
            .map_or_else(|| "os-release".to_string(), |p| p.display().to_string());

        self.id
            .as_deref()
            .map(DistributionId::new)
            .ok_or_else(|| PlatformError::Undetermined {
                reason: format!("no ID field in {location}"),
            })
    }
}

/// Detect the host distribution identifier. The os-release record it came
/// from is returned with it, so the file is read once.
pub fn detect_distribution() -> Result<(DistributionId, OsRelease), PlatformError> {
    let paths: Vec<PathBuf> = OS_RELEASE_PATHS.iter().map(PathBuf::from).collect();
    detect_distribution_on(std::env::consts::OS, &paths)
}

pub(crate) fn detect_distribution_on(
    os: &str,
    paths: &[PathBuf],
) -> Result<(DistributionId, OsRelease), PlatformError> {
    let release = read_os_release_on(os, paths)?;
    let id = release.distribution_id()?;
    Ok((id, release))
}

pub(crate) fn read_os_release_on(os: &str, paths: &[PathBuf]) -> Result<OsRelease, PlatformError> {
    if os != "linux" {
        return Err(PlatformError::NotLinux { os: os.to_string() });
    }

    let mut last_error = None;
    for path in paths {
        match fs::read_to_string(path) {
            Ok(content) => {
                let mut release = OsRelease::parse(&content);
                release.source = Some(path.clone());
                tracing::debug!(path = %path.display(), id = ?release.id, "read os-release");
                return Ok(release);
            }
            Err(err) => {
                tracing::debug!("cannot read {}: {err}", path.display());
                last_error = Some(format!("{}: {err}", path.display()));
            }
        }
    }

    Err(PlatformError::Undetermined {
        reason: last_error.unwrap_or_else(|| "no os-release file configured".to_string()),
    })
}

fn unquote(value: &str) -> String {
    let inner = ['"', '\'']
        .iter()
        .find_map(|q| {
            value
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(value);

    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }
    out
}
