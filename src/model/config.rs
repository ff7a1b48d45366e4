use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub kernels: KernelsConfig,
    pub settings: SettingsConfig,
    pub kernel: KernelSection,
    /// Where `save` writes. Unset for configs that never touched disk.
    #[serde(skip)]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelsConfig {
    #[serde(deserialize_with = "kernel_list")]
    pub available: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Backend name recorded after the first successful resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub privilege_tool: String,
    pub command_timeout_secs: u64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            backend: None,
            privilege_tool: "sudo".to_string(),
            command_timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelSection {
    /// `CONFIG_*` options applied by the `config:` command.
    pub config: BTreeMap<String, String>,
}

/// Older config files stored the list as one comma-separated string.
fn kernel_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum KernelList {
        List(Vec<String>),
        Csv(String),
    }

    let versions = match KernelList::deserialize(deserializer)? {
        KernelList::List(list) => list,
        KernelList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };

    Ok(versions
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config. A missing
    /// user file is created from the defaults.
    pub fn load() -> Result<Self> {
        match directories::ProjectDirs::from("", "", "tkt") {
            Some(dirs) => Self::load_from(&dirs.config_dir().join("settings.toml")),
            None => {
                tracing::warn!("no config directory available; using built-in defaults");
                Self::defaults()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::defaults()?;
            config.path = Some(path.to_path_buf());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, DEFAULTS).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("wrote default config to {}", path.display());
            return Ok(config);
        }

        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut config: AppConfig =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn defaults() -> Result<Self> {
        toml::from_str(DEFAULTS).context("parsing built-in defaults")
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }

    /// Record the resolved backend name if none is stored yet. Returns whether
    /// anything changed.
    pub fn record_backend(&mut self, name: &str) -> bool {
        if self.settings.backend.is_some() {
            return false;
        }
        self.settings.backend = Some(name.to_string());
        true
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.command_timeout_secs)
    }
}
