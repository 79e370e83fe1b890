use super::domain::CounsellingPhase;
use super::repository::RepositoryError;

/// Typed failure returned by every counselling operation. A failed call never
/// leaves partial state behind.
#[derive(Debug, thiserror::Error)]
pub enum CounsellingError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{operation} is not permitted during the {} phase", .current.label())]
    Phase {
        operation: &'static str,
        current: CounsellingPhase,
    },
    #[error("an allocation run is already in progress")]
    Concurrency,
    #[error("allocation invariant violated: {0}")]
    InvariantViolation(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}

impl CounsellingError {
    pub(crate) fn phase(operation: &'static str, current: CounsellingPhase) -> Self {
        Self::Phase { operation, current }
    }

    /// Stable machine-readable tag for transport layers.
    pub const fn kind(&self) -> &'static str {
        match self {
            CounsellingError::Validation(_) => "validation",
            CounsellingError::Phase { .. } => "phase",
            CounsellingError::Concurrency => "concurrency",
            CounsellingError::InvariantViolation(_) => "invariant_violation",
            CounsellingError::Persistence(_) => "persistence",
        }
    }
}

/// Input rejected at the boundary; nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown student '{0}'")]
    UnknownStudent(String),
    #[error("unknown course '{0}'")]
    UnknownCourse(String),
    #[error("course '{0}' is not accepting preferences")]
    InactiveCourse(String),
    #[error("course '{0}' appears more than once in the preference list")]
    DuplicateCourse(String),
    #[error("rank {0} is already held by another student")]
    DuplicateRank(u32),
    #[error("{entity} '{id}' is already registered")]
    AlreadyRegistered { entity: &'static str, id: String },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("rank must be a positive integer")]
    InvalidRank,
    #[error("capacity must be a positive integer")]
    InvalidCapacity,
}
