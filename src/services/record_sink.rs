//! Durable record sink
//!
//! Every file is written to `<name>.tmp` in the target directory and renamed
//! over the final path once fully flushed, so readers never see a partial
//! file. A failed write removes its temp file before the error propagates.
//!
//! Two formats:
//! - NDJSON: one compact JSON object per line, newline-terminated. Used for
//!   all collection outputs so downstream shippers can ingest incrementally.
//! - JSON: a single document, pretty-printed or compact, for ad hoc snapshots.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error as ThisError;
use tracing::{error, info, warn};

use crate::constants::PIPELINE_EXECUTION_FILE_PREFIX;
use crate::models::PipelineExecution;
use crate::utils::{timestamped_filename, wildcard_match};

#[derive(ThisError, Debug)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid JSON on line {line} of {path}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// One compact object per line
    Ndjson,
    /// Single pretty-printed document
    PrettyJson,
    /// Single compact document
    CompactJson,
}

/// Temp path used while writing `target`: same directory, `.tmp` extension
pub fn temp_path_for(target: &Path) -> PathBuf {
    target.with_extension("tmp")
}

/// Write `records` to `target` atomically and return the final path
pub fn write_records<T: Serialize>(
    records: &[T],
    target: &Path,
    format: RecordFormat,
) -> Result<PathBuf, SinkError> {
    let temp = write_temp(records, target, format)?;
    commit(&temp, target)?;
    Ok(target.to_path_buf())
}

/// First half of an atomic write: fully write and sync the temp file
pub(crate) fn write_temp<T: Serialize>(
    records: &[T],
    target: &Path,
    format: RecordFormat,
) -> Result<PathBuf, SinkError> {
    let temp = temp_path_for(target);
    let ser_err = |source: serde_json::Error| SinkError::Serialize {
        path: target.to_path_buf(),
        source,
    };

    write_temp_with(target, |writer| {
        match format {
            RecordFormat::Ndjson => {
                for record in records {
                    serde_json::to_writer(&mut *writer, record).map_err(ser_err)?;
                    writer.write_all(b"\n").map_err(io_err(&temp))?;
                }
            }
            RecordFormat::PrettyJson => {
                serde_json::to_writer_pretty(&mut *writer, records).map_err(ser_err)?;
                writer.write_all(b"\n").map_err(io_err(&temp))?;
            }
            RecordFormat::CompactJson => {
                serde_json::to_writer(&mut *writer, records).map_err(ser_err)?;
            }
        }
        Ok(())
    })
}

/// Create the temp file for `target`, let `write` fill it, then flush and sync.
///
/// On any failure the temp file is removed before the error is returned.
fn write_temp_with<F>(target: &Path, write: F) -> Result<PathBuf, SinkError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), SinkError>,
{
    let temp = temp_path_for(target);

    let result = (|| -> Result<(), SinkError> {
        let file = File::create(&temp).map_err(io_err(&temp))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;

        let file = writer.into_inner().map_err(|e| SinkError::Io {
            path: temp.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(io_err(&temp))?;
        Ok(())
    })();

    if let Err(e) = result {
        error!(path = %target.display(), error = %e, "Failed to save data");
        remove_temp(&temp);
        return Err(e);
    }

    Ok(temp)
}

/// Second half of an atomic write: rename the temp file over the target
pub(crate) fn commit(temp: &Path, target: &Path) -> Result<(), SinkError> {
    if let Err(source) = fs::rename(temp, target) {
        error!(path = %target.display(), error = %source, "Failed to rename temp file");
        remove_temp(temp);
        return Err(SinkError::Io {
            path: target.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn remove_temp(temp: &Path) {
    if temp.exists() {
        if let Err(e) = fs::remove_file(temp) {
            warn!(path = %temp.display(), error = %e, "Failed to remove temp file");
        }
    }
}

/// Read an NDJSON file back, one record per non-empty line
pub fn read_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SinkError> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut records = Vec::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_err(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| SinkError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Size and timestamps of one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FileStats {
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// File manager for the collector's data tree
#[derive(Debug, Clone)]
pub struct RecordSink {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl RecordSink {
    /// Create the sink, making `raw/` and `processed/` under `base` if needed
    pub fn new(base: impl AsRef<Path>) -> Result<Self, SinkError> {
        let base = base.as_ref();
        let raw_dir = base.join("raw");
        let processed_dir = base.join("processed");

        fs::create_dir_all(&raw_dir).map_err(io_err(&raw_dir))?;
        fs::create_dir_all(&processed_dir).map_err(io_err(&processed_dir))?;

        Ok(Self {
            raw_dir,
            processed_dir,
        })
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Save records as NDJSON under the raw directory
    pub fn write_ndjson<T: Serialize>(&self, records: &[T], filename: &str) -> Result<PathBuf, SinkError> {
        let path = write_records(records, &self.raw_dir.join(filename), RecordFormat::Ndjson)?;
        info!(
            path = %path.display(),
            records = records.len(),
            "Saved NDJSON data"
        );
        Ok(path)
    }

    /// Save a single JSON document under `dir` (default: raw directory)
    pub fn write_json<T: Serialize>(
        &self,
        value: &T,
        filename: &str,
        dir: Option<&Path>,
        pretty: bool,
    ) -> Result<PathBuf, SinkError> {
        let dir = dir.unwrap_or(self.raw_dir.as_path());
        fs::create_dir_all(dir).map_err(io_err(dir))?;

        let target = dir.join(filename);
        let ser_err = |source: serde_json::Error| SinkError::Serialize {
            path: target.clone(),
            source,
        };

        let temp = write_temp_with(&target, |writer| {
            if pretty {
                serde_json::to_writer_pretty(&mut *writer, value).map_err(ser_err)
            } else {
                serde_json::to_writer(&mut *writer, value).map_err(ser_err)
            }
        })?;

        commit(&temp, &target)?;
        info!(path = %target.display(), "Saved JSON data");
        Ok(target)
    }

    /// Save one pipeline execution record as a single NDJSON line
    pub fn save_pipeline_execution(
        &self,
        execution: &PipelineExecution,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, SinkError> {
        let filename = timestamped_filename(PIPELINE_EXECUTION_FILE_PREFIX, at);
        self.write_ndjson(std::slice::from_ref(execution), &filename)
    }

    /// Files in `dir` (default: raw directory) whose names match `pattern`, sorted
    pub fn list_files(&self, pattern: &str, dir: Option<&Path>) -> Result<Vec<PathBuf>, SinkError> {
        let dir = dir.unwrap_or(self.raw_dir.as_path());
        let mut files = Vec::new();

        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| wildcard_match(pattern, n))
                .unwrap_or(false);
            if matches {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn file_stats(&self, path: &Path) -> Result<FileStats, SinkError> {
        let meta = fs::metadata(path).map_err(io_err(path))?;
        Ok(FileStats {
            path: path.to_path_buf(),
            size_bytes: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Delete files matching `pattern` older than `max_age_days`.
    ///
    /// Individual deletion failures are logged and skipped. Returns the number
    /// of files removed.
    pub fn cleanup_old_files(
        &self,
        pattern: &str,
        max_age_days: u64,
        dir: Option<&Path>,
    ) -> Result<usize, SinkError> {
        self.cleanup_old_files_at(pattern, max_age_days, dir, SystemTime::now())
    }

    pub(crate) fn cleanup_old_files_at(
        &self,
        pattern: &str,
        max_age_days: u64,
        dir: Option<&Path>,
        now: SystemTime,
    ) -> Result<usize, SinkError> {
        let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);
        let mut removed = 0;

        for path in self.list_files(pattern, dir)? {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot read file age, skipping");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Removed old file");
                    removed += 1;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to remove file");
                }
            }
        }

        if removed > 0 {
            info!(removed = removed, "Cleaned up old files");
        }

        Ok(removed)
    }
}
