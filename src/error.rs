use std::path::PathBuf;

use chrono::NaiveDateTime;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SatfetchError {
    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("remote job {job_id} failed: {message}")]
    RemoteJob { job_id: String, message: String },

    #[error("unmapped remote job status: {0}")]
    #[diagnostic(help("add the status to the job state classification table"))]
    UnmappedJobStatus(String),

    #[error("invalid product id: {0}")]
    InvalidProductId(String),

    #[error("invalid batch interval: {0}")]
    InvalidInterval(String),

    #[error("could not parse {0} into a valid datetime")]
    DateTimeParse(String),

    #[error("missing credentials: set the environment variable {0}")]
    MissingCredentials(String),

    #[error("missing config file satfetch.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("EUMETSAT request failed: {0}")]
    EumetsatHttp(String),

    #[error("EUMETSAT returned status {status}: {message}")]
    EumetsatStatus { status: u16, message: String },

    #[error("unexpected EUMETSAT response: {0}")]
    InvalidResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
