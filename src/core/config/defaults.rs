use crate::character::LoadPolicy;
use crate::core::config::data::Config;
use std::path::PathBuf;

/// Keys accepted by `dawbrei set` / `dawbrei unset`.
pub const SETTABLE_KEYS: &[&str] = &[
    "model",
    "base-url",
    "characters-dir",
    "load-policy",
    "request-timeout",
    "speech",
    "speech-program",
    "speech-rate",
    "speech-volume",
    "speech-voice",
];

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("Expected on/off, got '{other}'")),
    }
}

impl Config {
    /// Apply a `set` command; returns the confirmation message.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<String, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("A value is required for {key}"));
        }

        match key {
            "model" => self.model = Some(value.to_string()),
            "base-url" => self.base_url = Some(value.to_string()),
            "characters-dir" => self.characters_dir = Some(PathBuf::from(value)),
            "load-policy" => {
                self.load_policy = Some(match value.to_ascii_lowercase().as_str() {
                    "abort" => LoadPolicy::Abort,
                    "skip" => LoadPolicy::Skip,
                    other => return Err(format!("Expected abort or skip, got '{other}'")),
                })
            }
            "request-timeout" => {
                let secs = value
                    .trim_end_matches('s')
                    .parse::<u64>()
                    .map_err(|_| format!("Expected a number of seconds, got '{value}'"))?;
                self.request_timeout_secs = Some(secs);
            }
            "speech" => self.speech.enabled = parse_bool(value)?,
            "speech-program" => self.speech.program = value.to_string(),
            "speech-rate" => {
                self.speech.rate = value
                    .parse()
                    .map_err(|_| format!("Expected words per minute, got '{value}'"))?
            }
            "speech-volume" => {
                let volume: f32 = value
                    .parse()
                    .map_err(|_| format!("Expected a volume between 0 and 1, got '{value}'"))?;
                if !(0.0..=1.0).contains(&volume) {
                    return Err(format!("Expected a volume between 0 and 1, got '{value}'"));
                }
                self.speech.volume = volume;
            }
            "speech-voice" => self.speech.voice = Some(value.to_string()),
            _ => return Err(format!("Unknown config key: {key}")),
        }

        Ok(format!("Set {key} to: {value}"))
    }

    /// Apply an `unset` command, restoring the default.
    pub fn unset_value(&mut self, key: &str) -> Result<String, String> {
        let defaults = crate::core::config::data::SpeechConfig::default();
        match key {
            "model" => self.model = None,
            "base-url" => self.base_url = None,
            "characters-dir" => self.characters_dir = None,
            "load-policy" => self.load_policy = None,
            "request-timeout" => self.request_timeout_secs = None,
            "speech" => self.speech.enabled = defaults.enabled,
            "speech-program" => self.speech.program = defaults.program,
            "speech-rate" => self.speech.rate = defaults.rate,
            "speech-volume" => self.speech.volume = defaults.volume,
            "speech-voice" => self.speech.voice = None,
            _ => return Err(format!("Unknown config key: {key}")),
        }
        Ok(format!("Unset {key}"))
    }
}
