//! Core traits and types for Newton-Krylov solving.
//!
//! This crate defines the shared abstractions that the solver facade and its
//! inner linear solvers build on:
//!
//! - [`DiscreteProblem`]: a discretized nonlinear system that evaluates its
//!   residual and assembles its Jacobian at a candidate solution
//! - [`Jacobian`]: sparse CSR storage that is assembled in place
//! - [`LinearOperator`]: anything that can be applied to a vector
//! - [`Preconditioner`]: a user-supplied preconditioner recomputed at each
//!   Newton step, shared through [`SharedPreconditioner`]
//! - [`Observer`]: receives solver events and optionally returns control actions
//! - [`NormType`], [`ScaleType`]: how residual and update norms are measured

mod jacobian;
mod norm;
mod observer;
mod operator;
mod preconditioner;
mod problem;

pub use jacobian::{Jacobian, PatternError, dense_pattern, pattern_from_entries};
pub use norm::{NormType, ScaleType};
pub use observer::Observer;
pub use operator::LinearOperator;
pub use preconditioner::{
    ApplyPreconditioner, Identity, Preconditioner, PreconditionerError, SharedPreconditioner,
    shared,
};
pub use problem::DiscreteProblem;
