use crate::core::config::data::{path_display, Config};
use crate::error::{Classify, ErrorKind};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CONFIG_DIR_ENV: &str = "KEIPES_CONFIG_DIR";
pub const DATA_DIR_ENV: &str = "KEIPES_DATA_DIR";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur when loading or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// Failed to serialize or write the configuration file.
    Write {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },

    /// No home directory could be determined and no override was given.
    NoProjectDirs,
}

impl ConfigError {
    fn display_path(path: &Path) -> String {
        path_display(path)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::Write { path, source } => {
                write!(
                    f,
                    "Failed to write config at {}: {}",
                    Self::display_path(path),
                    source
                )
            }
            ConfigError::NoProjectDirs => write!(
                f,
                "Could not determine the application directories; set {CONFIG_DIR_ENV} and {DATA_DIR_ENV}"
            ),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source.as_ref()),
            ConfigError::NoProjectDirs => None,
        }
    }
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }
}

/// Directories the application reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolves platform directories, honoring the `KEIPES_*_DIR` overrides.
    pub fn resolve() -> Result<Self, ConfigError> {
        let config_override = std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from);
        let data_override = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);

        if let (Some(config_dir), Some(data_dir)) = (&config_override, &data_override) {
            return Ok(Self::new(config_dir.clone(), data_dir.clone()));
        }

        let proj_dirs =
            ProjectDirs::from("org", "keipes", "keipes").ok_or(ConfigError::NoProjectDirs)?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| proj_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| proj_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn new(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Both directories under one root; used by tests and portable installs.
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("config"), root.join("data"))
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }

    pub fn mcp_contexts_file(&self) -> PathBuf {
        self.data_dir.join("mcp_contexts.json")
    }
}

impl Config {
    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|err| ConfigError::Write {
            path: config_path.to_path_buf(),
            source: Box::new(err),
        })?;
        write_atomic(config_path, contents.as_bytes()).map_err(|err| ConfigError::Write {
            path: config_path.to_path_buf(),
            source: Box::new(err),
        })
    }
}

/// Writes `contents` next to `path` and renames it into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;

    temp_file.write_all(contents)?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
