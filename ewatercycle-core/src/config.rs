//! Settings shared by parameter sets, models and observation loaders.
//!
//! A [`Config`] is created once by the caller and passed by reference to everything
//! that needs it. Values can be changed in place with [`Config::set`] and restored from
//! the backing file (or the built-in defaults) with [`Config::reload`].
//!
//! The backing file is TOML:
//!
//! ```toml
//! grdc_location = "/data/grdc"
//! parameterset_dir = "/data/parameter-sets"
//! output_dir = "/scratch/runs"
//!
//! [parameter_sets.pcrglobwb_rhinemeuse_30min]
//! directory = "pcrglobwb_rhinemeuse_30min"
//! config = "pcrglobwb_rhinemeuse_30min/setup_natural_test.ini"
//! target_model = "pcrglobwb"
//! supported_model_versions = ["setters"]
//! ```

use crate::errors::{EWCError, EWCResult};
use crate::parameter_set::ParameterSetConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the per-user configuration file.
pub const CONFIG_FILENAME: &str = "ewatercycle.toml";

/// Keys accepted by [`Config::set`] and [`Config::get`].
pub const CONFIG_KEYS: [&str; 4] = [
    "grdc_location",
    "output_dir",
    "parameterset_dir",
    "ewatercycle_config",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing GRDC station files (`<id>_Q_Day.Cmd.txt`)
    pub grdc_location: Option<PathBuf>,
    /// Directory below which model work directories are created
    pub output_dir: Option<PathBuf>,
    /// Root directory of all parameter sets
    pub parameterset_dir: Option<PathBuf>,
    /// Named parameter sets, resolved relative to `parameterset_dir`
    pub parameter_sets: BTreeMap<String, ParameterSetConfig>,
    /// File this configuration was read from and is reloaded from
    #[serde(skip)]
    pub ewatercycle_config: Option<PathBuf>,
}

impl Config {
    /// Read a configuration file and remember it as the backing file
    pub fn load(path: impl AsRef<Path>) -> EWCResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.ewatercycle_config = Some(path.to_path_buf());
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the per-user configuration file if it exists, otherwise the defaults
    pub fn from_user_config() -> EWCResult<Self> {
        let mut config = Config {
            ewatercycle_config: user_config_path(),
            ..Default::default()
        };
        config.reload()?;
        Ok(config)
    }

    /// Restore every value from the backing file.
    ///
    /// When `ewatercycle_config` is unset, or points at a file that does not exist,
    /// the built-in defaults are restored instead. The backing path itself is kept.
    pub fn reload(&mut self) -> EWCResult<()> {
        let backing = self.ewatercycle_config.clone();
        *self = match backing {
            Some(path) if path.is_file() => Config::load(path)?,
            backing => Config {
                ewatercycle_config: backing,
                ..Default::default()
            },
        };
        Ok(())
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> EWCResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Assign a path valued setting by key. `None` unsets it.
    pub fn set(&mut self, key: &str, value: Option<impl Into<PathBuf>>) -> EWCResult<()> {
        *self.slot_mut(key)? = value.map(Into::into);
        Ok(())
    }

    /// Look up a path valued setting by key
    pub fn get(&self, key: &str) -> EWCResult<Option<&Path>> {
        let value = match key {
            "grdc_location" => &self.grdc_location,
            "output_dir" => &self.output_dir,
            "parameterset_dir" => &self.parameterset_dir,
            "ewatercycle_config" => &self.ewatercycle_config,
            _ => return Err(EWCError::UnknownConfigKey(key.to_string())),
        };
        Ok(value.as_deref())
    }

    fn slot_mut(&mut self, key: &str) -> EWCResult<&mut Option<PathBuf>> {
        match key {
            "grdc_location" => Ok(&mut self.grdc_location),
            "output_dir" => Ok(&mut self.output_dir),
            "parameterset_dir" => Ok(&mut self.parameterset_dir),
            "ewatercycle_config" => Ok(&mut self.ewatercycle_config),
            _ => Err(EWCError::UnknownConfigKey(key.to_string())),
        }
    }
}

/// Location of the per-user configuration file
///
/// `$XDG_CONFIG_HOME/ewatercycle/ewatercycle.toml`, falling back to
/// `$HOME/.config/ewatercycle/ewatercycle.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("ewatercycle").join(CONFIG_FILENAME))
}
