//! Errors raised on the worker report channel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Could not encode report: {message}")]
    ReportEncoding { message: String },

    #[error("Malformed report line {line:?}: {message}")]
    MalformedReport { line: String, message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
