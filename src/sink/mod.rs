//! Sinks that persist output records.
//!
//! A batch is written as a whole: either every record is accepted or the
//! write fails. Retries are left to the caller.

pub mod influx;
pub mod line_protocol;

use std::io::Write;

use crate::record::OutputRecord;

pub use influx::InfluxSink;
pub use line_protocol::{encode_batch, encode_record};

/// An ordered set of records bound for one database.
#[derive(Debug, Clone)]
pub struct Batch {
    pub database: String,
    pub records: Vec<OutputRecord>,
}

impl Batch {
    /// Time precision of every batch. Records carry second timestamps.
    pub const PRECISION: &'static str = "s";

    pub fn new(database: impl Into<String>, records: Vec<OutputRecord>) -> Self {
        Self {
            database: database.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Write request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("InfluxDB rejected batch with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to write records: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes line protocol to stdout. Used for dry runs.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        let body = encode_batch(&batch.records);
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(body.as_bytes())?;
        lock.flush()?;
        Ok(())
    }
}

/// Sink dispatch.
pub enum Sink {
    Influx(InfluxSink),
    Stdout(StdoutSink),
}

impl Sink {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Influx(_) => "influxdb",
            Self::Stdout(_) => "stdout",
        }
    }

    pub async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        match self {
            Self::Influx(sink) => sink.write(batch).await,
            Self::Stdout(sink) => sink.write(batch),
        }
    }
}
