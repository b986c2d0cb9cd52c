//! Spoken playback of replies.
//!
//! Synthesis is delegated to an external speech program (`espeak-ng` by
//! default, macOS `say` also understood). The utterance is written to the
//! program's stdin so replies starting with `-` are never read as flags.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::SpeechConfig;

#[derive(Debug)]
pub enum SpeechError {
    /// The speech program could not be started or fed.
    Io(std::io::Error),
    /// The speech program ran but reported failure.
    Failed { program: String, code: Option<i32> },
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::Io(err) => write!(f, "Speech engine unavailable: {err}"),
            SpeechError::Failed { program, code } => match code {
                Some(code) => write!(f, "{program} exited with status {code}"),
                None => write!(f, "{program} was terminated by a signal"),
            },
        }
    }
}

impl std::error::Error for SpeechError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpeechError::Io(err) => Some(err),
            SpeechError::Failed { .. } => None,
        }
    }
}

impl From<std::io::Error> for SpeechError {
    fn from(err: std::io::Error) -> Self {
        SpeechError::Io(err)
    }
}

#[async_trait]
pub trait Speaker: Send + Sync {
    /// Render `text` audibly; returns once the engine has finished.
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

/// Speaker that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct MutedSpeaker;

#[async_trait]
impl Speaker for MutedSpeaker {
    async fn speak(&self, _text: &str) -> Result<(), SpeechError> {
        Ok(())
    }
}

/// Speaker backed by an external text-to-speech command.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: speech_args(config),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Build the voice arguments for the configured program.
fn speech_args(config: &SpeechConfig) -> Vec<String> {
    let stem = Path::new(&config.program)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut args = Vec::new();
    if stem == "say" {
        args.push("-r".to_string());
        args.push(config.rate.to_string());
        if let Some(voice) = &config.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
    } else {
        // espeak amplitude runs 0-200 with 100 as the normal level.
        let amplitude = (config.volume.clamp(0.0, 1.0) * 100.0).round() as u32;
        args.push("-s".to_string());
        args.push(config.rate.to_string());
        args.push("-a".to_string());
        args.push(amplitude.to_string());
        if let Some(voice) = &config.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
    }
    args.extend(config.extra_args.iter().cloned());
    args
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        debug!(program = %self.program, chars = text.len(), "Speaking reply");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SpeechError::Failed {
                program: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

/// Pick the speaker for a session.
pub fn speaker_from_config(config: &SpeechConfig, muted: bool) -> Box<dyn Speaker> {
    if muted || !config.enabled {
        Box::new(MutedSpeaker)
    } else {
        Box::new(CommandSpeaker::from_config(config))
    }
}
