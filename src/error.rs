use thiserror::Error;

use crate::core::{CellKind, FiberId};

/// Error type produced by user effects and cleanups.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while rendering, committing or tearing down a [`ResourceFiber`](crate::ResourceFiber).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TapError {
    /// A primitive was called at an index whose cell has a different kind, or no cell exists.
    #[error("{fiber}: cell {index} was requested as {requested} but holds {}", describe_stored(.stored))]
    CellShape {
        fiber: FiberId,
        index: usize,
        requested: CellKind,
        stored: Option<CellKind>,
    },

    /// A primitive found a cell of the right kind holding a value of another type.
    #[error("{fiber}: cell {index} holds a different value type than `{requested}`")]
    CellType {
        fiber: FiberId,
        index: usize,
        requested: &'static str,
    },

    /// A render called fewer primitives than the first render of the fiber.
    #[error("{fiber}: rendered {found} cells, but the first render rendered {expected}")]
    CellCount {
        fiber: FiberId,
        expected: usize,
        found: usize,
    },

    #[error("{fiber}: effect {index} called with and without dependencies across re-renders")]
    DepsShape { fiber: FiberId, index: usize },

    #[error("{fiber}: effect {index} must either return a cleanup function or nothing. Received: {received}")]
    InvalidEffectReturn {
        fiber: FiberId,
        index: usize,
        received: &'static str,
    },

    #[error("{fiber}: effect {index} failed")]
    Effect {
        fiber: FiberId,
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("{fiber}: cleanup of effect {index} failed")]
    Cleanup {
        fiber: FiberId,
        index: usize,
        #[source]
        source: BoxError,
    },

    #[error("{fiber}: maximum update depth ({limit}) exceeded")]
    UpdateDepth { fiber: FiberId, limit: usize },
}

impl TapError {
    /// The fiber the error was raised for.
    pub fn fiber(&self) -> FiberId {
        match self {
            TapError::CellShape { fiber, .. }
            | TapError::CellType { fiber, .. }
            | TapError::CellCount { fiber, .. }
            | TapError::DepsShape { fiber, .. }
            | TapError::InvalidEffectReturn { fiber, .. }
            | TapError::Effect { fiber, .. }
            | TapError::Cleanup { fiber, .. }
            | TapError::UpdateDepth { fiber, .. } => *fiber,
        }
    }

    /// The cell index the error was raised for, if it concerns a single cell.
    pub fn cell_index(&self) -> Option<usize> {
        match self {
            TapError::CellShape { index, .. }
            | TapError::CellType { index, .. }
            | TapError::DepsShape { index, .. }
            | TapError::InvalidEffectReturn { index, .. }
            | TapError::Effect { index, .. }
            | TapError::Cleanup { index, .. } => Some(*index),
            TapError::CellCount { .. } | TapError::UpdateDepth { .. } => None,
        }
    }
}

fn describe_stored(stored: &Option<CellKind>) -> String {
    match stored {
        Some(kind) => format!("a {kind} cell"),
        None => "no cell".to_string(),
    }
}
