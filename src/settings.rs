use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use log::{debug, warn};

use crate::{PrepmindError, Result};

/// Small persistent key-value store for user preferences.
pub trait SettingsPort: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsPort for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Settings kept as a flat TOML table in one file.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl SettingsPort for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        match self.read_table() {
            Ok(mut table) => table.remove(key),
            Err(e) => {
                warn!("ignoring unreadable {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Fails without touching the file when the existing file cannot be
    /// read, so other keys are never dropped.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut table = self.read_table()?;
        table.insert(key.to_owned(), value.to_owned());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(&table)?)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = PrepmindError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => {
                Err(PrepmindError::Config(format!("unknown theme {other:?}")))
            }
        }
    }
}

/// Current theme, persisted under one settings key.
pub struct ThemeController<S: SettingsPort> {
    settings: S,
    key: String,
    theme: Theme,
}

impl<S: SettingsPort> ThemeController<S> {
    /// Apply the saved theme, or light when none is saved.
    pub fn load(settings: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let theme = match settings.get(&key) {
            Some(saved) => saved.parse().unwrap_or_else(|e| {
                warn!("{e}, falling back to light");
                Theme::Light
            }),
            None => Theme::Light,
        };

        let mut controller = Self {
            settings,
            key,
            theme,
        };
        controller.apply(theme)?;
        Ok(controller)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn apply(&mut self, theme: Theme) -> Result<()> {
        self.settings.set(&self.key, theme.as_str())?;
        self.theme = theme;
        debug!("theme set to {theme}");
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<Theme> {
        let next = self.theme.toggled();
        self.apply(next)?;
        Ok(next)
    }

    /// Enter and space toggle, other keys are ignored.
    pub fn handle_key(&mut self, key: &str) -> Result<Option<Theme>> {
        match key {
            "Enter" | " " => self.toggle().map(Some),
            _ => Ok(None),
        }
    }

    /// State of the switch for assistive technology.
    pub fn aria_checked(&self) -> bool {
        self.theme == Theme::Dark
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }
}
