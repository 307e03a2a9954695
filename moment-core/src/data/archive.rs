//! On-disk store for the downloaded ticker archive.
//!
//! Layout: `{cache_dir}/tiingo_tickers.zip`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Extraction of one fixed CSV entry into non-blank lines
//! - Every read failure is logged and reported as an empty list

use super::provider::FinanceError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// File name of the saved archive inside the cache directory.
pub const ARCHIVE_FILE: &str = "tiingo_tickers.zip";

/// Entry inside the vendor archive. Fixed by Tiingo.
pub const TICKER_ENTRY: &str = "supported_tickers.csv";

/// What is currently on disk, for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveStatus {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Local>>,
    pub blake3: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
    entry: String,
}

impl ArchiveStore {
    /// Store at `{cache_dir}/tiingo_tickers.zip` reading the Tiingo entry.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self::with_entry(cache_dir.as_ref().join(ARCHIVE_FILE), TICKER_ENTRY)
    }

    pub fn with_entry(path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry: entry.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the whole stream to the archive path, replacing what was there.
    ///
    /// Returns the number of bytes written. The data is flushed and synced
    /// before the rename, so a crash leaves either the old or the new file.
    pub fn persist(&self, stream: &mut dyn Read) -> Result<u64, FinanceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| FinanceError::Io(format!("create {}: {e}", parent.display())))?;
        }

        let tmp_path = self.path.with_extension("zip.tmp");
        let written = write_file(&tmp_path, stream).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FinanceError::Io(format!("write {}: {e}", tmp_path.display()))
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            FinanceError::Io(format!("atomic rename failed: {e}"))
        })?;

        tracing::debug!(path = %self.path.display(), bytes = written, "ticker archive saved");
        Ok(written)
    }

    /// Non-blank lines of the ticker entry, in file order.
    ///
    /// Missing file, unreadable archive, missing entry and decode errors all
    /// yield an empty list.
    pub fn extract(&self) -> Vec<String> {
        if !self.exists() {
            tracing::debug!(path = %self.path.display(), "no ticker archive on disk");
            return Vec::new();
        }

        match self.try_extract() {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ticker archive unreadable");
                Vec::new()
            }
        }
    }

    fn try_extract(&self) -> Result<Vec<String>, FinanceError> {
        let file = fs::File::open(&self.path)
            .map_err(|e| FinanceError::Io(format!("open {}: {e}", self.path.display())))?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| FinanceError::Archive(format!("not a zip archive: {e}")))?;

        let entries: Vec<String> = archive.file_names().map(String::from).collect();
        let entry = archive.by_name(&self.entry).map_err(|_| {
            FinanceError::Archive(format!(
                "entry '{}' missing; archive holds {entries:?}",
                self.entry
            ))
        })?;

        read_lines(BufReader::new(entry))
            .map_err(|e| FinanceError::Archive(format!("read entry '{}': {e}", self.entry)))
    }

    /// Delete the archive. A missing file is not an error.
    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "deleted ticker archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not delete ticker archive")
            }
        }
    }

    /// Size, modification time and content hash of the archive, if present.
    pub fn status(&self) -> Option<ArchiveStatus> {
        let meta = fs::metadata(&self.path).ok()?;
        let bytes = fs::read(&self.path).ok()?;
        Some(ArchiveStatus {
            path: self.path.clone(),
            size_bytes: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Local>::from),
            blake3: blake3::hash(&bytes).to_hex().to_string(),
        })
    }
}

fn write_file(path: &Path, stream: &mut dyn Read) -> io::Result<u64> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    let written = io::copy(stream, &mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(written)
}

/// Collect the non-blank lines of a text stream, stripping `\r\n` endings.
///
/// Invalid UTF-8 is replaced with U+FFFD within its own line only.
pub fn read_lines(mut reader: impl BufRead) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if !line.trim().is_empty() {
            lines.push(line.into_owned());
        }
    }
    Ok(lines)
}
