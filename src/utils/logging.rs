//! Optional chat transcript, appended to a user-chosen file.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct TranscriptLog {
    path: Option<PathBuf>,
    paused: bool,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl TranscriptLog {
    pub fn new(path: Option<String>) -> io::Result<Self> {
        let mut log = Self {
            path: None,
            paused: false,
        };
        if let Some(path) = path {
            log.start(path)?;
        }
        Ok(log)
    }

    /// Switch to `path`, creating it if needed; fails without changing the
    /// current file when `path` cannot be opened for appending.
    pub fn start(&mut self, path: impl Into<PathBuf>) -> io::Result<String> {
        let path = path.into();
        open_append(&path)?;

        self.path = Some(path);
        self.paused = false;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.append(&format!("## Transcript started {stamp}"))?;

        Ok(format!("Logging enabled to: {}", self.describe_path()))
    }

    /// Pause or resume; `None` when no file was ever chosen.
    pub fn toggle(&mut self) -> io::Result<Option<String>> {
        if self.path.is_none() {
            return Ok(None);
        }
        if self.paused {
            self.paused = false;
            Ok(Some(format!("Logging resumed to: {}", self.describe_path())))
        } else {
            self.append("## Transcript paused")?;
            self.paused = true;
            Ok(Some(format!("Logging paused ({})", self.describe_path())))
        }
    }

    pub fn is_recording(&self) -> bool {
        self.path.is_some() && !self.paused
    }

    /// Record what `speaker` (`You` or a character name) said.
    pub fn log_turn(&self, speaker: &str, content: &str) -> io::Result<()> {
        self.append(&format!("{speaker}: {content}"))
    }

    /// Append one entry followed by a blank separator line.
    fn append(&self, entry: &str) -> io::Result<()> {
        let Some(path) = self.path.as_deref().filter(|_| !self.paused) else {
            return Ok(());
        };

        let mut writer = BufWriter::new(open_append(path)?);
        for line in entry.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        writer.flush()
    }

    fn describe_path(&self) -> String {
        self.path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}
