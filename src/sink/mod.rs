//! Row sinks for flushed follower batches.
//!
//! - `CsvFileSink`: appends rows to a CSV file, header written once
//! - `InspectSink`: prints the available field names and writes nothing

mod file;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FollowerRecord;

pub use file::CsvFileSink;

/// Destination for flushed batches.
#[async_trait]
pub trait RowSink: Send {
    /// Write `records` using `fields` as the column list.
    ///
    /// Returns the number of rows written.
    async fn write_batch(&mut self, fields: &[String], records: &[FollowerRecord]) -> Result<usize>;

    /// Whether written rows are persisted. The driver only enriches batches
    /// and commits cursors for durable sinks.
    fn is_durable(&self) -> bool {
        true
    }
}

/// Prints field names instead of writing rows.
#[derive(Debug, Default)]
pub struct InspectSink {
    printed: Vec<Vec<String>>,
}

impl InspectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field lists printed so far.
    pub fn printed(&self) -> &[Vec<String>] {
        &self.printed
    }
}

#[async_trait]
impl RowSink for InspectSink {
    async fn write_batch(&mut self, fields: &[String], _records: &[FollowerRecord]) -> Result<usize> {
        println!("{:?}", fields);
        self.printed.push(fields.to_vec());
        Ok(0)
    }

    fn is_durable(&self) -> bool {
        false
    }
}
