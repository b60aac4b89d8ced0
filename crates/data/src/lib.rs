pub mod detect;
pub mod ingest;

use thiserror::Error;

pub use detect::{detect_format, normalizer_for};
pub use ingest::{
    ingest_csv, ingest_csv_file, ingest_snapshot, prepare_csv, prepare_snapshot, IngestReport,
    PreparedBatch,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unrecognized CSV format; headers: {}", .headers.join(", "))]
    UnknownFormat { headers: Vec<String> },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}
