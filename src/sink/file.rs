//! CSV file sink.
//!
//! The file is opened in append mode and never truncated. The header row is
//! written only when the file is new or empty; once written it fixes the
//! column order for every later batch, and fields missing from it are
//! dropped. A final row cut short by an interrupted write is terminated
//! before new rows are appended.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use crate::error::{AppError, Result};
use crate::models::FollowerRecord;
use crate::sink::RowSink;

/// What is already on disk at the sink path.
#[derive(Debug)]
struct ExistingFile {
    header: Option<Vec<String>>,
    ends_with_newline: bool,
}

/// Appends follower rows to a CSV file.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header row and trailing byte of the existing file, `None` if the file
    /// is missing or empty.
    async fn existing(&self) -> Result<Option<ExistingFile>> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        if file.metadata().await?.len() == 0 {
            return Ok(None);
        }

        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        file.seek(SeekFrom::Start(0)).await?;

        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).await?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());
        let header = match reader.records().next() {
            Some(row) => Some(row?.iter().map(str::to_string).collect()),
            None => None,
        };

        Ok(Some(ExistingFile {
            header,
            ends_with_newline: last[0] == b'\n',
        }))
    }
}

#[async_trait]
impl RowSink for CsvFileSink {
    async fn write_batch(&mut self, fields: &[String], records: &[FollowerRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let existing = self.existing().await?;
        let torn = existing.as_ref().is_some_and(|f| !f.ends_with_newline);
        let (columns, new_file) = match existing.and_then(|f| f.header) {
            Some(header) => (header, false),
            None => (fields.to_vec(), true),
        };

        let mut buffer = Vec::new();
        if torn {
            log::warn!("{} ends mid-row, terminating it", self.path.display());
            buffer.push(b'\n');
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(buffer);

        if new_file {
            writer.write_record(&columns)?;
        }
        for record in records {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| record.text(column).unwrap_or_default()),
            )?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;

        log::info!(
            "Wrote {} rows to {}{}",
            records.len(),
            self.path.display(),
            if new_file { " (with header)" } else { "" }
        );
        Ok(records.len())
    }
}
