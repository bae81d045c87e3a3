//! User preferences: theme, onboarding and sign-in state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad preferences TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("user name must not be empty")]
    EmptyUserName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub onboarding_complete: bool,
    pub signed_in_as: Option<String>,
}

/// Preferences persisted as a TOML file. A missing file means defaults.
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Preferences, PrefsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(src) => Ok(toml::from_str(&src)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(source) => Err(PrefsError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        let body = toml::to_string_pretty(prefs)?;
        let write_err = |source| PrefsError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&self.path, body).map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }

    /// Load, apply `f`, save. Returns the updated preferences.
    pub fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences, PrefsError> {
        let mut prefs = self.load()?;
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<Preferences, PrefsError> {
        self.update(|p| p.theme = theme)
    }

    pub fn toggle_theme(&self) -> Result<Preferences, PrefsError> {
        self.update(|p| p.theme = p.theme.toggled())
    }

    pub fn complete_onboarding(&self) -> Result<Preferences, PrefsError> {
        self.update(|p| p.onboarding_complete = true)
    }

    /// Record a signed-in user. Signing in also completes onboarding.
    pub fn sign_in(&self, name: &str) -> Result<Preferences, PrefsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PrefsError::EmptyUserName);
        }
        self.update(|p| {
            p.signed_in_as = Some(name.to_string());
            p.onboarding_complete = true;
        })
    }

    pub fn sign_out(&self) -> Result<Preferences, PrefsError> {
        self.update(|p| p.signed_in_as = None)
    }
}
