use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),
    #[error("failed to parse toml: {0}")]
    Parse(toml::de::Error),
    #[error("failed to serialize toml: {0}")]
    Serialize(toml::ser::Error),
    #[error("store.{0}: sqlite backend needs a path")]
    MissingStorePath(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub daily: DailySection,
    #[serde(default)]
    pub index: IndexSection,
    #[serde(default)]
    pub store: StoreSection,
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, settings) in [("live", &self.store.live), ("build", &self.store.build)] {
            if settings.backend == Backend::Sqlite && settings.path.as_os_str().is_empty() {
                return Err(ConfigError::MissingStorePath(name));
            }
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Store settings for either the build store or the live one.
    pub fn store_settings(&self, temporary: bool) -> &StoreSettings {
        if temporary {
            &self.store.build
        } else {
            &self.store.live
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DailySection {
    /// Length of the digest prefix a package has to share with the date.
    pub bits: u32,
    /// Number of days, starting at the build date, to precompute.
    pub window_days: u32,
}

impl Default for DailySection {
    fn default() -> Self {
        DailySection {
            bits: 8,
            window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexSection {
    pub dir: PathBuf,
    pub repos: Vec<String>,
}

impl Default for IndexSection {
    fn default() -> Self {
        IndexSection {
            dir: PathBuf::from("repodata"),
            repos: [
                "current",
                "current/nonfree",
                "current/multilib",
                "current/multilib/nonfree",
                "current/aarch64",
                "current/aarch64/nonfree",
                "current/musl",
                "current/musl/nonfree",
            ]
            .iter()
            .map(|repo| repo.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreSection {
    pub live: StoreSettings,
    pub build: StoreSettings,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            live: StoreSettings {
                backend: Backend::Sqlite,
                path: PathBuf::from("pkgcat.db"),
            },
            build: StoreSettings {
                backend: Backend::Sqlite,
                path: PathBuf::from("pkgcat.db.new"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}
