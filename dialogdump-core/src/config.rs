use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DumpError, Result};
use crate::filter::DialogFilter;

const DEFAULT_DUMPER: &str = "ndjson";

/// Session configuration, usually read from `config.toml`
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Root directory for progress state and default dumper output
    pub backup_dir: PathBuf,
    /// Local archive read by the archive provider
    pub archive: Option<PathBuf>,
    pub dumper: DumperConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumperConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: DumperOptions,
}

impl DumperConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_DUMPER)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    backup_dir: Option<String>,
    archive: Option<String>,
    #[serde(default)]
    dumper: DumperConfig,
    #[serde(default)]
    filter: FilterConfig,
}

impl BackupConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// when present, otherwise built-in defaults apply.
    pub fn load(provided: Option<&Path>) -> Result<Self> {
        let raw = match provided {
            Some(explicit) => {
                let path = expand_path(explicit)?;
                if !path.exists() {
                    return Err(DumpError::config(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                load_raw_config(&path)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => load_raw_config(&path)?,
                None => RawConfig::default(),
            },
        };
        Self::from_raw(raw)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)
            .map_err(|err| DumpError::config(format!("invalid config: {err}")))?;
        Self::from_raw(raw)
    }

    /// `<config dir>/dialogdump/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dialogdump").join("config.toml"))
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let backup_dir = match raw.backup_dir {
            Some(dir) => expand_path(Path::new(&dir))?,
            None => default_backup_dir(),
        };
        let archive = raw
            .archive
            .map(|p| expand_path(Path::new(&p)))
            .transpose()?;

        Ok(Self {
            backup_dir,
            archive,
            dumper: raw.dumper,
            filter: raw.filter,
        })
    }

    pub fn dialog_filter(&self) -> Result<DialogFilter> {
        DialogFilter::new(&self.filter.include, &self.filter.exclude)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: default_backup_dir(),
            archive: None,
            dumper: DumperConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

fn default_backup_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dialogdump"))
        .unwrap_or_else(|| PathBuf::from("dialogdump-backup"))
}

fn load_raw_config(path: &Path) -> Result<RawConfig> {
    let text = fs::read_to_string(path)
        .map_err(|err| DumpError::config(format!("failed to read {}: {err}", path.display())))?;
    toml::from_str(&text)
        .map_err(|err| DumpError::config(format!("failed to parse {}: {err}", path.display())))
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DumpError::config("unable to resolve home directory"))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Dumper-specific settings. Each dumper declares the keys it understands and
/// rejects the rest at construction time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DumperOptions(toml::Table);

impl DumperOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<toml::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Fail on any key outside `known`
    pub fn ensure_known(&self, dumper: &str, known: &[&str]) -> Result<()> {
        match self.0.keys().find(|key| !known.contains(&key.as_str())) {
            Some(key) => Err(DumpError::config(format!(
                "dumper '{dumper}' does not recognize option '{key}' (known: {})",
                known.join(", ")
            ))),
            None => Ok(()),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(type_error(key, "a string", other)),
        }
    }

    pub fn get_path(&self, key: &str) -> Result<Option<PathBuf>> {
        self.get_str(key)?
            .map(|s| expand_path(Path::new(s)))
            .transpose()
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(n)) if *n >= 0 => Ok(Some(*n as usize)),
            Some(other) => Err(type_error(key, "a non-negative integer", other)),
        }
    }
}

fn type_error(key: &str, expected: &str, found: &toml::Value) -> DumpError {
    DumpError::config(format!(
        "option '{key}' must be {expected}, found {}",
        found.type_str()
    ))
}
