//! Named, versioned input datasets for a model.

use crate::config::Config;
use crate::errors::{EWCError, EWCResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Description of a parameter set as stored in the configuration file.
///
/// Paths may be relative to the configured `parameterset_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSetConfig {
    pub directory: PathBuf,
    pub config: PathBuf,
    pub target_model: String,
    #[serde(default)]
    pub supported_model_versions: BTreeSet<String>,
}

/// Input dataset and configuration file for a target model
///
/// The directory and config file always resolve below the configured
/// parameter set root. An empty `supported_model_versions` set means the
/// parameter set has not been verified against any particular model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    name: String,
    directory: PathBuf,
    config: PathBuf,
    target_model: String,
    supported_model_versions: BTreeSet<String>,
}

impl ParameterSet {
    /// Create a parameter set, resolving `directory` and `config` under
    /// `config.parameterset_dir`.
    pub fn new<I, S>(
        name: impl Into<String>,
        directory: impl AsRef<Path>,
        config_file: impl AsRef<Path>,
        target_model: impl Into<String>,
        supported_model_versions: I,
        config: &Config,
    ) -> EWCResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let root = config
            .parameterset_dir
            .as_deref()
            .ok_or(EWCError::ConfigKeyNotSet("parameterset_dir"))?;

        Ok(Self {
            name: name.into(),
            directory: resolve_under(root, directory.as_ref())?,
            config: resolve_under(root, config_file.as_ref())?,
            target_model: target_model.into(),
            supported_model_versions: supported_model_versions
                .into_iter()
                .map(Into::into)
                .collect(),
        })
    }

    /// Create a parameter set from its configuration file entry
    pub fn from_config(
        name: impl Into<String>,
        entry: &ParameterSetConfig,
        config: &Config,
    ) -> EWCResult<Self> {
        Self::new(
            name,
            &entry.directory,
            &entry.config,
            entry.target_model.clone(),
            entry.supported_model_versions.iter().cloned(),
            config,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn config(&self) -> &Path {
        &self.config
    }

    pub fn target_model(&self) -> &str {
        &self.target_model
    }

    pub fn supported_model_versions(&self) -> &BTreeSet<String> {
        &self.supported_model_versions
    }

    /// Whether the parameter set has been downloaded
    pub fn is_available(&self) -> bool {
        self.directory.is_dir()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Parameter set")?;
        writeln!(f, "-------------")?;
        writeln!(f, "name={}", self.name)?;
        writeln!(f, "directory={}", self.directory.display())?;
        writeln!(f, "config={}", self.config.display())?;
        writeln!(f, "target_model={}", self.target_model)?;
        let versions: Vec<&str> = self
            .supported_model_versions
            .iter()
            .map(String::as_str)
            .collect();
        write!(f, "supported_model_versions={{{}}}", versions.join(", "))
    }
}

/// Names of the configured parameter sets whose directory exists.
///
/// Restricted to one target model when `target_model` is given.
pub fn available_parameter_sets(
    config: &Config,
    target_model: Option<&str>,
) -> EWCResult<Vec<String>> {
    let mut names = Vec::new();
    for (name, entry) in &config.parameter_sets {
        if target_model.is_some_and(|target| target != entry.target_model) {
            continue;
        }
        if ParameterSet::from_config(name.as_str(), entry, config)?.is_available() {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// Look up a configured parameter set by name
pub fn get_parameter_set(config: &Config, name: &str) -> EWCResult<ParameterSet> {
    let entry = config
        .parameter_sets
        .get(name)
        .ok_or_else(|| EWCError::UnknownParameterSet {
            name: name.to_string(),
            available: config.parameter_sets.keys().cloned().collect(),
        })?;
    ParameterSet::from_config(name, entry, config)
}

fn resolve_under(root: &Path, path: &Path) -> EWCResult<PathBuf> {
    let inside = if path.is_absolute() {
        normalize(path).starts_with(normalize(root))
    } else {
        // relative paths must not climb above the root, whatever form the root has
        !matches!(normalize(path).components().next(), Some(Component::ParentDir))
    };
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    if !inside {
        return Err(EWCError::OutsideParameterSetDir {
            path: resolved,
            root: root.to_path_buf(),
        });
    }
    Ok(resolved)
}

/// Lexically remove `.` and `..` components.
///
/// A `..` with no preceding normal component is kept, or dropped directly below the
/// filesystem root.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(Component::ParentDir),
            },
            other => out.push(other),
        }
    }
    out
}
