pub mod gmsh;
pub mod param_parser;
pub mod write_to_csv;
pub mod write_to_vtu;

use std::path::PathBuf;

use thiserror::Error;

use crate::error::SimError;

/// Failures of the file-facing shell around the solver.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("cannot parse mesh file at line {line}: {reason}")]
    MeshParse { line: usize, reason: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("results folder {0} already exists")]
    ResultsExist(PathBuf),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("cannot write {path}: {reason}")]
    Vtk { path: PathBuf, reason: String },

    #[error(transparent)]
    Sim(#[from] SimError),
}

pub type IoResult<T> = std::result::Result<T, IoError>;

impl IoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::Io {
            path: path.into(),
            source,
        }
    }
}
