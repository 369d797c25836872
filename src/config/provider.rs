//! Configuration sources, applied in order by the loader.
//!
//! Each provider produces a complete [`Layer`] on its own; overlaying is
//! the loader's job, so adding a source never touches the existing ones.

use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use super::{
    ConfigError, FileLoadSource,
    defaults::{self, DEVELOPER_MODE, RECOGNIZED_KEYS},
    value::{Layer, Value},
};

/// A source of configuration values.
pub trait Provider {
    /// Short source name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Reads the source into a flat layer.
    fn collect(&self) -> Result<Layer, ConfigError>;
}

/// Supplies the default table the loader was built with.
#[derive(Debug, Clone)]
pub struct DefaultsProvider {
    table: Layer,
}

impl DefaultsProvider {
    pub fn new(table: Layer) -> Self {
        Self { table }
    }
}

impl Provider for DefaultsProvider {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn collect(&self) -> Result<Layer, ConfigError> {
        let missing = defaults::missing_keys(&self.table);
        if !missing.is_empty() {
            return Err(ConfigError::Defaults { missing });
        }
        Ok(self.table.clone())
    }
}

/// Document formats accepted for the file source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Picks the parser from the file extension (`.yaml`, `.yml`, `.json`).
    ///
    /// The extension runs from the last `.` of the file name, so a bare
    /// `.yaml` dotfile counts as YAML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .and_then(|name| name.rfind('.').map(|dot| name[dot..].to_string()))
            .unwrap_or_default();

        match extension.as_str() {
            ".yaml" | ".yml" => Ok(FileFormat::Yaml),
            ".json" => Ok(FileFormat::Json),
            _ => Err(ConfigError::UnsupportedFileType { extension }),
        }
    }

    fn parse(self, content: &str) -> Result<Layer, FileLoadSource> {
        let layer = match self {
            FileFormat::Yaml => Layer::from_yaml(serde_yaml::from_str(content)?),
            FileFormat::Json => Layer::from_json(serde_json::from_str(content)?),
        };
        layer.ok_or(FileLoadSource::NotAMapping)
    }
}

/// Reads a YAML or JSON document from disk.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
    format: FileFormat,
}

impl FileProvider {
    /// Resolves the format up front, so an unsupported extension fails
    /// without the file ever being opened.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let format = FileFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn load_error(&self, source: FileLoadSource) -> ConfigError {
        ConfigError::FileLoad {
            path: self.path.clone(),
            source,
        }
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn collect(&self) -> Result<Layer, ConfigError> {
        let content =
            fs::read_to_string(&self.path).map_err(|err| self.load_error(err.into()))?;
        self.format
            .parse(&content)
            .map_err(|source| self.load_error(source))
    }
}

/// Exposes environment variables under their literal names.
#[derive(Debug, Clone, Default)]
pub struct EnvProvider {
    snapshot: Option<Vec<(OsString, OsString)>>,
}

impl EnvProvider {
    /// Reads the live process environment at collection time.
    pub fn from_process() -> Self {
        Self { snapshot: None }
    }

    /// Uses a fixed set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            snapshot: Some(
                vars.into_iter()
                    .map(|(name, value)| (name.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl Provider for EnvProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn collect(&self) -> Result<Layer, ConfigError> {
        let vars: Vec<(OsString, OsString)> = match &self.snapshot {
            Some(vars) => vars.clone(),
            None => env::vars_os().collect(),
        };

        let mut layer = Layer::new();
        for (name, value) in vars {
            // A name that is not unicode can never match a dotted key.
            let Ok(name) = name.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => layer.insert(name, Value::String(value)),
                Err(_) if is_recognized(&name) => return Err(ConfigError::EnvLoad { name }),
                Err(_) => {
                    tracing::trace!(variable = %name, "skipping non-unicode environment value");
                }
            }
        }
        Ok(layer)
    }
}

fn is_recognized(name: &str) -> bool {
    name == DEVELOPER_MODE || RECOGNIZED_KEYS.contains(&name)
}
