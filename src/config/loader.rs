//! Layered settings loading
//!
//! Precedence, lowest first: built-in defaults, the `[settings]` table of a
//! TOML file, environment variables, then `--set key=value` overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::{Settings, SETTING_KEYS};
use crate::errors::MeshRouteError;

/// File name searched for in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".meshroute.toml";

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    settings: Settings,
}

impl Settings {
    /// Parse the `[settings]` table of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, MeshRouteError> {
        let file: SettingsFile = toml::from_str(content).map_err(|e| {
            MeshRouteError::invalid_config(
                format!("failed to parse settings file: {}", e),
                "Settings live under a [settings] table using camelCase keys",
            )
        })?;
        Ok(file.settings)
    }

    /// Load settings from a TOML file
    ///
    /// Looks for config in:
    /// 1. Specified path (if provided, must exist)
    /// 2. .meshroute.toml in current directory
    /// 3. <config dir>/meshroute/config.toml
    ///
    /// Returns `Ok(None)` when no file was given and none was found.
    pub fn load_file(path: Option<&Path>) -> Result<Option<Self>, MeshRouteError> {
        if let Some(path) = path {
            return Self::load_path(path).map(Some);
        }

        for candidate in default_config_paths() {
            if candidate.exists() {
                return Self::load_path(&candidate).map(Some);
            }
        }

        debug!("No settings file found, using defaults");
        Ok(None)
    }

    fn load_path(path: &Path) -> Result<Self, MeshRouteError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeshRouteError::invalid_config(
                format!("failed to read settings file {}: {}", path.display(), e),
                "Check the --config path",
            )
        })?;
        debug!("Loaded settings from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Overlay values from an environment lookup; empty values are ignored
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), MeshRouteError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, env_name) in SETTING_KEYS {
            match lookup(env_name).filter(|v| !v.is_empty()) {
                Some(value) => {
                    debug!("{} set from {}", key, env_name);
                    self.set(key, &value)?;
                }
                None => debug!("Env {} not set. Keeping {}", env_name, key),
            }
        }
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<(), MeshRouteError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply `key=value` overrides
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> Result<(), MeshRouteError> {
        for raw in overrides {
            let raw = raw.as_ref();
            let (key, value) = raw.split_once('=').ok_or_else(|| {
                MeshRouteError::invalid_config(
                    format!("malformed override '{}'", raw),
                    "Overrides take the form --set key=value",
                )
            })?;
            self.set(key.trim(), value.trim())?;
        }
        Ok(())
    }

    /// Resolve settings from every layer
    pub fn resolve<S: AsRef<str>>(
        config_path: Option<&Path>,
        overrides: &[S],
    ) -> Result<Self, MeshRouteError> {
        let mut settings = Self::load_file(config_path)?.unwrap_or_default();
        settings.apply_env()?;
        settings.apply_overrides(overrides)?;
        Ok(settings)
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("meshroute").join("config.toml"));
    }
    paths
}
