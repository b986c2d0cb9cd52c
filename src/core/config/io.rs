use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const CONFIG_PATH_ENV: &str = "DAWBREI_CONFIG";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    /// The file exists but is not a valid config document.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Write { path: PathBuf, source: io::Error },
    Encode(toml::ser::Error),
    /// Neither `DAWBREI_CONFIG` nor a platform config directory is available.
    NoConfigDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {source}", path_display(path))
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {source}", path_display(path))
            }
            ConfigError::Write { path, source } => {
                write!(f, "Failed to write config to {}: {source}", path_display(path))
            }
            ConfigError::Encode(err) => write!(f, "Failed to encode config: {err}"),
            ConfigError::NoConfigDir => write!(
                f,
                "Could not determine a configuration directory; set {CONFIG_PATH_ENV}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } | ConfigError::Write { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Encode(err) => Some(err),
            ConfigError::NoConfigDir => None,
        }
    }
}

/// Replace `target` with `contents` via a sibling temp file and rename, so a
/// crash never leaves a half-written file behind.
pub(crate) fn write_atomically(target: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(contents)?;
    staged.as_file_mut().sync_all()?;
    staged.persist(target).map_err(|err| err.error)?;
    Ok(())
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::get_config_path()?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::get_config_path()?)
    }

    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Encode)?;
        write_atomically(path, contents.as_bytes()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `DAWBREI_CONFIG` if set, otherwise `config.toml` in the platform
    /// configuration directory.
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        ProjectDirs::from("org", "dawbrei", "dawbrei")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }
}
