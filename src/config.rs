use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{PrepmindError, Result, THEME_KEY, USERS_COLLECTION};

const APP_DIR: &str = "prepmind";
const CONFIG_FILE: &str = "config.toml";
const SETTINGS_FILE: &str = "settings.toml";

/// Application configuration.
///
/// Persisted as TOML under the platform config directory:
/// - Linux: $XDG_CONFIG_HOME/prepmind/config.toml or
///   $HOME/.config/prepmind/config.toml
/// - macOS: $HOME/Library/Application Support/prepmind/config.toml
/// - Windows: %APPDATA%\prepmind\config.toml
///
/// Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Collection holding one profile document per user id.
    pub users_collection: String,
    /// Settings key the theme is stored under.
    pub theme_key: String,
    /// Logger filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Theme settings file, `settings.toml` next to the config when unset.
    pub settings_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            users_collection: USERS_COLLECTION.to_owned(),
            theme_key: THEME_KEY.to_owned(),
            log_filter: "info".to_owned(),
            settings_file: None,
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = env::var("APPDATA") {
                return Ok(PathBuf::from(appdata).join(APP_DIR));
            }
            return Err(PrepmindError::Config(
                "Unable to determine config directory (missing APPDATA)".into(),
            ));
        }

        #[cfg(target_os = "macos")]
        {
            if let Ok(home) = env::var("HOME") {
                return Ok(PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join(APP_DIR));
            }
            return Err(PrepmindError::Config(
                "Unable to determine config directory (missing HOME)".into(),
            ));
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let base = if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg)
            } else if let Ok(home) = env::var("HOME") {
                PathBuf::from(home).join(".config")
            } else {
                return Err(PrepmindError::Config(
                    "Unable to determine config directory \
                     (missing XDG_CONFIG_HOME/HOME)"
                        .into(),
                ));
            };
            Ok(base.join(APP_DIR))
        }
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load from the default location, defaults when the file is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_file()?)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        match &self.settings_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(SETTINGS_FILE)),
        }
    }
}

/// Initialise `env_logger`, `RUST_LOG` taking precedence over the
/// configured filter. Repeated calls are ignored.
pub fn init_logging(config: &AppConfig) {
    let env = env_logger::Env::default()
        .default_filter_or(config.log_filter.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new("prepmind_config").unwrap();
        let config =
            AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.users_collection, "users");
        assert_eq!(config.theme_key, "prepmind-theme");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new("prepmind_config").unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_filter = \"debug\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.users_collection, "users");
    }

    #[test]
    fn save_round_trip_creates_directory() {
        let dir = TempDir::new("prepmind_config").unwrap();
        let path = dir.path().join("a").join("config.toml");
        let config = AppConfig {
            settings_file: Some(dir.path().join("theme.toml")),
            ..AppConfig::default()
        };

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.settings_path().unwrap(),
            dir.path().join("theme.toml")
        );
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = TempDir::new("prepmind_config").unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "users_collection = [").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PrepmindError::Config(_)));
    }
}
