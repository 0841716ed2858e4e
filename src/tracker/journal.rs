//! JSONL-based trace journal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::Tracker;
use crate::error::{Error, Result};
use crate::trial::TraceEntry;

/// Appends every finished trial as one JSON line.
///
/// Several processes may append to the same file: writes take an exclusive
/// file lock, [`load`](Self::load) takes a shared one.
///
/// # Examples
///
/// ```no_run
/// use simcal::tracker::JournalTracker;
///
/// let tracker = JournalTracker::new("trace.jsonl");
/// ```
pub struct JournalTracker {
    path: PathBuf,
}

impl JournalTracker {
    /// A journal writing to `path`. The file is created on the first entry.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all entries from a journal file. A missing file yields no
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<TraceEntry>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        file.lock_shared()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let reader = BufReader::new(&file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| Error::Storage(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line).map_err(|e| Error::Storage(e.to_string()))?);
        }

        file.unlock()
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(entries)
    }
}

impl Tracker for JournalTracker {
    fn notify(&mut self, entry: &TraceEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Storage(e.to_string()))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let line = serde_json::to_string(entry).map_err(|e| Error::Storage(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| Error::Storage(e.to_string()))?;
        file.flush().map_err(|e| Error::Storage(e.to_string()))?;

        file.unlock()
            .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }
}
