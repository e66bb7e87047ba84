//! File-backed record log.

use crate::error::StorageResult;
use crate::frame;
use crate::log::RecordLog;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A record log stored in a single file.
///
/// # Durability
///
/// - `append()` writes the whole frame with one `write_all`
/// - `sync()` calls `File::sync_data()`
/// - `open()` truncates a torn trailing frame left by a crash
///
/// # Example
///
/// ```no_run
/// use pagefeed_storage::{FileRecordLog, RecordLog};
/// use std::path::Path;
///
/// let mut log = FileRecordLog::open(Path::new("feed.log")).unwrap();
/// log.append(b"entry batch").unwrap();
/// log.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileRecordLog {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileRecordLog {
    /// Opens or creates a log file, recovering from a torn tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or if a frame before
    /// the tail is corrupted.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let scan = frame::scan(&data)?;

        if scan.valid_len < data.len() as u64 {
            warn!(
                path = %path.display(),
                discarded = data.len() as u64 - scan.valid_len,
                "truncating torn tail of record log"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), records = scan.records.len(), "opened record log");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: scan.valid_len,
        })
    }

    /// Opens a log file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordLog for FileRecordLog {
    fn append(&mut self, record: &[u8]) -> StorageResult<u64> {
        let framed = frame::encode(record)?;
        let offset = self.size;

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&framed)?;
        self.size += framed.len() as u64;

        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        // A failed append may have written past `self.size`, so cut the file
        // even when the tracked size already matches.
        self.file.set_len(len)?;
        self.size = len;
        self.file.sync_all()?;
        debug!(path = %self.path.display(), len, "truncated record log");
        Ok(())
    }

    fn records(&self) -> StorageResult<Vec<Vec<u8>>> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;

        let mut data = Vec::with_capacity(self.size as usize);
        file.take(self.size).read_to_end(&mut data)?;

        Ok(frame::scan(&data)?.records)
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        let log = FileRecordLog::open(&path).unwrap();
        assert_eq!(log.size().unwrap(), 0);
        assert!(log.records().unwrap().is_empty());
        assert!(path.exists());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        {
            let mut log = FileRecordLog::open(&path).unwrap();
            log.append(b"push 1").unwrap();
            log.append(b"assign 1").unwrap();
            log.sync().unwrap();
        }

        let log = FileRecordLog::open(&path).unwrap();
        assert_eq!(
            log.records().unwrap(),
            vec![b"push 1".to_vec(), b"assign 1".to_vec()]
        );
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        let full_size = {
            let mut log = FileRecordLog::open(&path).unwrap();
            log.append(b"complete").unwrap();
            log.append(b"half written").unwrap();
            log.sync().unwrap();
            log.size().unwrap()
        };

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_size - 6).unwrap();
        drop(file);

        let mut log = FileRecordLog::open(&path).unwrap();
        assert_eq!(log.records().unwrap(), vec![b"complete".to_vec()]);

        log.append(b"after recovery").unwrap();
        log.sync().unwrap();
        drop(log);

        let log = FileRecordLog::open(&path).unwrap();
        assert_eq!(
            log.records().unwrap(),
            vec![b"complete".to_vec(), b"after recovery".to_vec()]
        );
    }

    #[test]
    fn truncate_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.log");

        {
            let mut log = FileRecordLog::open(&path).unwrap();
            log.append(b"kept").unwrap();
            let before = log.size().unwrap();
            log.append(b"taken back").unwrap();
            log.truncate(before).unwrap();
            log.append(b"next").unwrap();
            log.sync().unwrap();
        }

        let log = FileRecordLog::open(&path).unwrap();
        assert_eq!(log.records().unwrap(), vec![b"kept".to_vec(), b"next".to_vec()]);
    }

    #[test]
    fn create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("feed.log");

        let log = FileRecordLog::open_with_create_dirs(&path).unwrap();
        assert_eq!(log.path(), path);
    }
}
