//! Global presenter configuration (keybindings), stored as TOML.

/// Key codes, actions and the keymap.
pub mod keys;

use crate::foundation::error::{SlidesError, SlidesResult};
use crate::slides::model::ensure_parent_dir;
use anyhow::Context as _;
use keys::Keys;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the keybinding config, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".wavyte-slides.toml";

/// Default slides folder.
pub const DEFAULT_FOLDER_PATH: &str = "./slides";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keys: Keys,
}

impl Config {
    pub fn from_toml_str(text: &str) -> SlidesResult<Self> {
        let cfg: Self = toml::from_str(text)
            .map_err(|e| SlidesError::serde(format!("invalid config: {e}")))?;
        cfg.keys.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> SlidesResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Load `path` when it exists, the default config otherwise.
    pub fn load_or_default(path: &Path) -> SlidesResult<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("no configuration file found, using default configuration");
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> SlidesResult<String> {
        toml::to_string_pretty(self).map_err(|e| SlidesError::serde(format!("serialize config: {e}")))
    }

    pub fn to_file(&self, path: &Path) -> SlidesResult<()> {
        ensure_parent_dir(path)?;
        std::fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("write config '{}'", path.display()))?;
        Ok(())
    }

    pub fn merge_with(self, other: &Config) -> SlidesResult<Self> {
        Ok(Self {
            keys: self.keys.merge_with(&other.keys)?,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/config/config.rs"]
mod tests;
