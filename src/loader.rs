//! Definition loader
//!
//! Loads tracked collection definitions from YAML or JSON files.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::assemble::TrackedCollection;

/// Environment variable overriding the definition directory
pub const CONFIG_DIR_ENV: &str = "SURVEY_FLOW_CONFIG_DIR";

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No definition named '{name}' in {dir}")]
    NotFound { name: String, dir: PathBuf },

    #[error("Unsupported definition format: {0}")]
    UnsupportedFormat(PathBuf),
}

pub struct DefinitionLoader {
    config_dir: PathBuf,
}

impl DefinitionLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Create loader from SURVEY_FLOW_CONFIG_DIR or default to "config"
    pub fn from_env() -> Self {
        match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new("config"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load the definition `<name>.yaml`, `<name>.yml` or `<name>.json` from
    /// the config directory, in that order of preference.
    pub fn load(&self, name: &str) -> Result<TrackedCollection, LoadError> {
        let path = EXTENSIONS
            .iter()
            .map(|ext| self.config_dir.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
                dir: self.config_dir.clone(),
            })?;
        self.load_path(path)
    }

    /// Load a definition file, choosing the parser by extension.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<TrackedCollection, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let collection: TrackedCollection = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|source| LoadError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some("json") => serde_json::from_str(&content).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        };

        info!(
            "Loaded definition {} with {} steps from {}",
            collection.task_identifier,
            collection.steps.len(),
            path.display()
        );
        Ok(collection)
    }

    /// Names of the definitions available in the config directory, sorted.
    pub fn definitions(&self) -> Result<Vec<String>, LoadError> {
        let entries = std::fs::read_dir(&self.config_dir).map_err(|source| LoadError::Io {
            path: self.config_dir.clone(),
            source,
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext))
            })
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
