//! # Result Sink
//!
//! Append-only output of matching seeds, one decimal integer per line.
//!
//! ## Guarantees
//!
//! 1. **No interleaving**: concurrent submissions are serialized by a mutex,
//!    so every line is complete.
//! 2. **Durability**: the stream is flushed before `submit()` returns.
//! 3. **Fatal failure**: a write error is returned to the caller, which
//!    aborts the scan. Lines written before it stay valid.

use crate::error::{ScanError, ScanResult, SinkError};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Where matching seeds are written.
pub enum OutputTarget {
    /// A file, created or truncated when the scan starts.
    File(PathBuf),
    /// An arbitrary stream owned by the caller.
    Stream(Box<dyn Write + Send>),
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl OutputTarget {
    /// Opens the target for writing.
    ///
    /// Files are re-checked here even if the caller validated the path
    /// earlier, since it can change between validation and scan start.
    pub fn open(self) -> ScanResult<ResultSink> {
        match self {
            Self::File(path) => {
                prepare_output(&path)?;
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
                    .map_err(|source| ScanError::OutputPath {
                        path: path.clone(),
                        source,
                    })?;
                Ok(ResultSink::new(Box::new(BufWriter::new(file))))
            }
            Self::Stream(stream) => Ok(ResultSink::new(stream)),
        }
    }
}

/// Checks that `path` can be used as the output file.
///
/// Creates missing parent directories. Fails when the path is a directory
/// or an existing read-only file.
pub fn prepare_output(path: &Path) -> ScanResult<()> {
    let fail = |source: io::Error| ScanError::OutputPath {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "output path is a directory",
        ))),
        Ok(meta) if meta.permissions().readonly() => Err(fail(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "output file is read-only",
        ))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fail(e)),
    }
}

/// Serialized writer of matching seeds.
pub struct ResultSink<W: Write + Send = Box<dyn Write + Send>> {
    writer: Mutex<W>,
    written: AtomicU64,
}

impl<W: Write + Send> fmt::Debug for ResultSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("written", &self.written())
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send> ResultSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            written: AtomicU64::new(0),
        }
    }

    /// Appends one seed and flushes.
    pub fn submit(&self, seed: i64) -> Result<(), SinkError> {
        {
            let mut writer = self.writer.lock();
            writeln!(writer, "{seed}")
                .and_then(|()| writer.flush())
                .map_err(|source| SinkError::Write { seed, source })?;
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        info!(seed, "Found seed");
        Ok(())
    }

    /// Seeds written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Scratch file path unique to this process and call.
#[cfg(test)]
pub(crate) fn temp_path(tag: &str) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("cavefinder_{tag}_{}_{id}_{n}.txt", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that fails after a fixed number of bytes.
    struct Failing {
        budget: usize,
    }

    impl Write for Failing {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.budget {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.budget -= buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_submit_appends_lines() {
        let sink = ResultSink::new(Vec::new());
        sink.submit(42).unwrap();
        sink.submit(-7).unwrap();
        assert_eq!(sink.written(), 2);
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "42\n-7\n");
    }

    #[test]
    fn test_write_failure_is_reported() {
        let sink = ResultSink::new(Failing { budget: 3 });
        sink.submit(12).unwrap();
        let err = sink.submit(123_456).unwrap_err();
        assert!(matches!(err, SinkError::Write { seed: 123_456, .. }));
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_file_target_truncates() {
        let path = temp_path("truncate");
        fs::write(&path, "stale\n").unwrap();
        let sink = OutputTarget::File(path.clone()).open().unwrap();
        sink.submit(5).unwrap();
        drop(sink);
        assert_eq!(fs::read_to_string(&path).unwrap(), "5\n");
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_prepare_creates_parent_directories() {
        let dir = temp_path("nested");
        let path = dir.join("a").join("result.txt");
        prepare_output(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_prepare_rejects_directory() {
        let dir = temp_path("dir");
        fs::create_dir_all(&dir).unwrap();
        assert!(matches!(prepare_output(&dir), Err(ScanError::OutputPath { .. })));
        fs::remove_dir_all(&dir).ok();
    }
}
