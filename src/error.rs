use thiserror::Error;

/// Errors surfaced by the projection pursuit engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PursuitError {
    /// Shapes of data, target or projection disagree. Fatal to the call that raised it.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    /// A perturbation strategy's structural requirement is not met.
    #[error("Precondition not met: {0}")]
    Precondition(String),

    /// A connection endpoint could not be found in the identifier column.
    #[error("Unresolved identifier: {0}")]
    UnresolvedIdentifier(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Cluster tree contract violation.
    #[error("Invalid cluster: {0}")]
    InvalidCluster(String),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// The pursuit worker thread could not be spawned or panicked.
    #[error("Worker failure: {0}")]
    Worker(String),

    /// Decomposition failure inside the solver.
    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl PursuitError {
    pub(crate) fn mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        PursuitError::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Whether the pursuit loop may retry on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, PursuitError::Precondition(_))
    }
}

pub type Result<T> = std::result::Result<T, PursuitError>;
