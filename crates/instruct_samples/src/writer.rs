//! Append-only JSONL sink for training samples.

use crate::types::{FormatError, FormatResult};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes one JSON record per line. Takes `&mut self`; callers sharing a writer
/// across threads wrap it themselves.
pub struct JsonlSampleWriter<W: Write> {
    inner: W,
    path: PathBuf,
    written: usize,
}

impl JsonlSampleWriter<BufWriter<File>> {
    /// Truncate or create `path`, creating parent directories.
    pub fn create(path: &Path) -> FormatResult<Self> {
        Self::open(path, false)
    }

    /// Append to `path`, creating it if missing.
    pub fn append(path: &Path) -> FormatResult<Self> {
        Self::open(path, true)
    }

    fn open(path: &Path, append: bool) -> FormatResult<Self> {
        let io_err = |e| FormatError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(io_err)?;
        Ok(Self::from_writer(BufWriter::new(file), path))
    }
}

impl<W: Write> JsonlSampleWriter<W> {
    /// Wrap any writer; `label` names it in error messages.
    pub fn from_writer(inner: W, label: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: label.into(),
            written: 0,
        }
    }

    pub fn write<S: Serialize>(&mut self, record: &S) -> FormatResult<()> {
        serde_json::to_writer(&mut self.inner, record).map_err(|e| FormatError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        self.inner.write_all(b"\n").map_err(|e| FormatError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> FormatResult<()> {
        self.inner.flush().map_err(|e| FormatError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
