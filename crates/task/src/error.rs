use thiserror::Error;

/// Errors shared by every crate in the workspace.
///
/// Mirrors the error kinds of spec.md §7 one-for-one: unsupported input is
/// fatal at ingestion, size and time limits are recoverable control flow
/// rather than panics, unsolvability is a first-class result, and invariant
/// violations are defensive bugs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("task uses a feature outside the supported SAS+ fragment: {0}")]
    UnsupportedTask(String),

    #[error("operation would exceed its configured size limit: {0}")]
    SizeLimitExceeded(String),

    #[error("the task (or one of its factors) is unsolvable")]
    Unsolvable,

    #[error("cooperative timer expired before the operation completed")]
    TimedOut,

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
