use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write table: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to flush table: {0}")]
    Flush(#[from] std::io::Error),
    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("field {value:?} contains a tab or line break")]
    UnwritableField { value: String },
    #[error("table writer used before open")]
    NotOpen,
}
