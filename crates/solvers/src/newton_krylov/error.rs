use thiserror::Error;

/// Errors that prevent a solve from starting.
///
/// Failing to converge is not an error; it is reported through
/// [`Status`](crate::engine::Status).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("initial guess has {actual} entries but the problem has {expected} unknowns")]
    DimensionMismatch { expected: usize, actual: usize },
}
