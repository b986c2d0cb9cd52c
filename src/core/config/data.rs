use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::character::store::DEFAULT_CHARACTERS_DIR;
use crate::character::LoadPolicy;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const CHARACTERS_DIR_ENV: &str = "DAWBREI_CHARACTERS_DIR";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speak replies aloud
    pub enabled: bool,
    /// Speech program to run; `espeak-ng`, `espeak` and `say` are understood
    pub program: String,
    /// Words per minute
    pub rate: u32,
    /// Loudness from 0.0 to 1.0
    pub volume: f32,
    /// Voice name passed to the speech program
    pub voice: Option<String>,
    /// Extra arguments appended after the voice arguments
    pub extra_args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "espeak-ng".to_string(),
            rate: 200,
            volume: 1.0,
            voice: None,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model identifier sent with each completion request
    pub model: Option<String>,
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
    /// Folder holding one `<name>.json` per character
    pub characters_dir: Option<PathBuf>,
    /// What to do with unreadable character files at startup
    pub load_policy: Option<LoadPolicy>,
    /// Give up on a completion request after this many seconds
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Config {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn load_policy(&self) -> LoadPolicy {
        self.load_policy.unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve the characters folder.
    ///
    /// Precedence: `DAWBREI_CHARACTERS_DIR`, then the config file, then
    /// `characters` in the working directory.
    pub fn characters_dir(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os(CHARACTERS_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        self.characters_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHARACTERS_DIR))
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/dawbrei/config.toml` → `~/.config/dawbrei/config.toml`
/// - Windows paths are returned unchanged
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
