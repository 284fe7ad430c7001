//! Inexact Newton-Krylov solving for discrete nonlinear problems.
//!
//! [`NewtonKrylovSolver`] solves `F(x) = 0` for any
//! [`DiscreteProblem`](newtonkit_core::DiscreteProblem). Each outer step
//! evaluates the residual, checks the [`ConvergenceCriteria`], assembles the
//! Jacobian, and solves the Newton system with a Krylov or direct method
//! from [`linear`].
//!
//! The crate is organized by concern:
//!
//! - [`newton_krylov`]: the solver facade and its statistics
//! - [`convergence`]: composable stopping tests
//! - [`linear`]: inner linear solvers and their settings
//! - [`preconditioning`]: built-in and shared preconditioners
//! - [`adapter`]: the bridge from a problem to an engine
//! - [`engine`]: the outer iteration and its observer events
//! - [`output`]: diagnostic categories logged through `tracing`

pub mod adapter;
pub mod convergence;
pub mod engine;
pub mod linear;
pub mod newton_krylov;
pub mod output;
pub mod preconditioning;

pub use convergence::{CombinePolicy, ConvergenceCriteria};
pub use engine::{Action, Event, Failure, Status};
pub use linear::{LinearSolverConfig, Method};
pub use newton_krylov::{NewtonKrylovSolver, SolverStatistics};
pub use output::OutputFlags;
