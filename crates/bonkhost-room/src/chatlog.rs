//! Append-only chat log with flush-to-file.

use std::fs;
use std::path::{Path, PathBuf};

use time::format_description::{self, OwnedFormatItem};
use time::OffsetDateTime;

use crate::RoomError;

// File names need a separator-free variant of the timestamp.
const FILE_NAME_FORMAT: &str = "[year]-[month]-[day]_[hour]-[minute]-[second]";

/// In-memory line buffer; one line per logged room event.
#[derive(Debug)]
pub struct ChatLog {
    dir: PathBuf,
    line_format: OwnedFormatItem,
    file_format: OwnedFormatItem,
    lines: Vec<String>,
}

impl ChatLog {
    /// `format` is the configured `timeStampFormat`; an unparsable
    /// format description is a startup error.
    pub fn new(dir: impl Into<PathBuf>, format: &str) -> Result<Self, RoomError> {
        let line_format = format_description::parse_owned::<2>(format)
            .map_err(|e| RoomError::InvalidConfig(format!("timeStampFormat: {e}")))?;
        let file_format = format_description::parse_owned::<2>(FILE_NAME_FORMAT)
            .map_err(|e| RoomError::InvalidConfig(format!("file name format: {e}")))?;
        Ok(Self {
            dir: dir.into(),
            line_format,
            file_format,
            lines: Vec::new(),
        })
    }

    /// Appends `[<timestamp>] <content>`.
    pub fn append(&mut self, content: &str) {
        let stamp = Self::stamp(&self.line_format);
        self.lines.push(format!("[{stamp}] {content}"));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Writes the buffer to `<dir>/<timestamp>.txt`, newline-terminated,
    /// then empties it. The directory is created if absent.
    pub fn save(&mut self) -> Result<PathBuf, RoomError> {
        fs::create_dir_all(&self.dir).map_err(|source| RoomError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self
            .dir
            .join(format!("{}.txt", Self::stamp(&self.file_format)));

        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        fs::write(&path, text).map_err(|source| RoomError::Io {
            path: path.clone(),
            source,
        })?;
        self.lines.clear();
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stamp(format: &OwnedFormatItem) -> String {
        let now = OffsetDateTime::now_utc();
        now.format(format)
            .unwrap_or_else(|_| now.unix_timestamp().to_string())
    }
}
