//! Resolve-once settings holder.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{default_settings_path, ConfigError, Result, Settings};

/// Names the TOML settings file used for lazy resolution.
pub const ENV_SETTINGS_FILE: &str = "REDMINE_SETTINGS_FILE";

/// Holds the session settings, set exactly once.
///
/// Settings come either from an explicit `configure` call or, on first
/// `get`, from the settings file. After that they never change.
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: OnceCell<Settings>,
    /// File used for lazy resolution instead of the environment lookup.
    file: Option<PathBuf>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that lazily resolves from `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            settings: OnceCell::new(),
            file: Some(path.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.get().is_some()
    }

    /// Set the settings explicitly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyConfigured` if settings were already set
    /// or resolved.
    pub fn configure(&self, settings: Settings) -> Result<()> {
        self.settings
            .set(settings)
            .map_err(|_| ConfigError::AlreadyConfigured)
    }

    /// Get the settings, resolving them from the settings file on first use.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` if no settings file exists, or
    /// the read/parse error of an existing but broken file.
    pub fn get(&self) -> Result<&Settings> {
        if let Some(settings) = self.settings.get() {
            return Ok(settings);
        }

        let path = self.settings_path()?;
        let settings = resolve_file(&path)?;
        debug!(path = %path.display(), "Resolved settings from file");
        Ok(self.settings.get_or_init(|| settings))
    }

    fn settings_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.file {
            return Ok(path.clone());
        }
        match std::env::var_os(ENV_SETTINGS_FILE) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => default_settings_path(),
        }
    }
}

fn resolve_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        warn!(path = %path.display(), "Could not find settings file");
        return Err(ConfigError::NotConfigured);
    }
    Settings::from_file(path)
}
