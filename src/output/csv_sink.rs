use super::record::{ProfileRecord, CSV_COLUMNS};
use super::traits::{OutputError, OutputResult, ResultSink};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Appends records to a CSV file shared by every worker of a run
///
/// The file is reopened in append mode for every row so a partially written
/// batch is always on disk. A single mutex serializes writers; the guard is
/// released on every exit path, including write errors.
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    rows_written: Mutex<u64>,
}

impl CsvSink {
    /// Prepares the CSV file for a run
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the CSV file; parent directories are created
    /// * `append` - Keep existing rows (resuming). When false the file is
    ///   truncated and a fresh header written.
    ///
    /// # Returns
    ///
    /// * `Ok(CsvSink)` - File is ready and carries exactly one header
    /// * `Err(OutputError)` - Directory or file could not be created
    pub fn initialize(path: impl Into<PathBuf>, append: bool) -> OutputResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let has_rows = file_len(&path)? > 0;
        if append && has_rows {
            tracing::info!("Appending to existing CSV {}", path.display());
        } else {
            let file = File::create(&path).map_err(|e| io_error(&path, e))?;
            write_header(&path, file)?;
            tracing::info!("Initialized CSV {} with header", path.display());
        }

        Ok(Self {
            path,
            rows_written: Mutex::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows appended through this sink
    pub fn rows_written(&self) -> u64 {
        *self.rows_written.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResultSink for CsvSink {
    fn append(&self, record: &ProfileRecord) -> OutputResult<()> {
        let mut rows = self.rows_written.lock().unwrap_or_else(|e| e.into_inner());

        // The file may have been removed or emptied since initialization
        let header_needed = file_len(&self.path)? == 0;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_error(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if header_needed {
            writer.write_record(CSV_COLUMNS)?;
            tracing::info!("Header written to {} on append", self.path.display());
        }
        writer.write_record(record.to_row())?;
        writer.flush().map_err(|e| io_error(&self.path, e))?;

        *rows += 1;
        tracing::debug!("Row for {} appended to {}", record.url, self.path.display());
        Ok(())
    }
}

fn write_header(path: &Path, file: File) -> OutputResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(CSV_COLUMNS)?;
    writer.flush().map_err(|e| io_error(path, e))
}

fn file_len(path: &Path) -> OutputResult<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}
