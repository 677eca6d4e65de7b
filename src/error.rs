use thiserror::Error;

use crate::disc::cell::Edge;

/// Errors raised while building the mesh or advancing the field.
///
/// None of these are recoverable for the run in progress; the caller decides
/// whether to abort or move on to the next configuration.
#[derive(Debug, Error)]
pub enum SimError {
    /// Wrong node arity for a variant, or a node without a coordinate.
    #[error("malformed {cell_type} cell {id}: {reason}")]
    MalformedCell {
        cell_type: String,
        id: usize,
        reason: String,
    },

    #[error("degenerate geometry in cell {id}: zero-length edge {edge}")]
    DegenerateGeometry { id: usize, edge: Edge },

    #[error("unknown cell type '{0}'")]
    UnknownCellType(String),

    #[error("inconsistent mesh topology: {0}")]
    InconsistentTopology(String),

    #[error("solver started before initial conditions were set")]
    NotInitialized,

    #[error("step observer failed at step {step}: {source}")]
    Observer {
        step: usize,
        #[source]
        source: ObserverError,
    },
}

pub type SimResult<T> = std::result::Result<T, SimError>;

/// Error type returned by step observers.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;
