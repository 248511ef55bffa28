use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("skipping {} due to unrecognized date pattern", .0.display())]
    UnrecognizedPattern(PathBuf),

    #[error("error opening {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading line {line} of {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("error creating {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid timestamp pattern: {0}")]
    InvalidPattern(String),

    #[error("worker for {} did not complete: {reason}", .path.display())]
    Worker { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open { path: path.into(), source }
    }

    pub(crate) fn create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Create { path: path.into(), source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write { path: path.into(), source }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
