//! The boundary between the solver facade and a nonlinear iteration engine.
//!
//! An engine owns the outer iteration: it evaluates the residual, checks the
//! convergence criteria, asks for a Jacobian and preconditioner, solves for a
//! Newton step, and decides whether to accept it. It reaches the problem only
//! through the adapter capability traits, so any engine can drive any
//! problem.
//!
//! [`InexactNewton`] is the built-in engine.
//!
//! # Observer Events
//!
//! Engines emit [`Event`]s as the iteration proceeds:
//!
//! - [`Event::Evaluated`]: the criteria were checked at an accepted iterate
//! - [`Event::LinearSolved`]: a Newton step was computed
//! - [`Event::StepRejected`]: a trial step was rejected
//!
//! Observers can return [`Action::StopEarly`] to halt after any event. The
//! last accepted iterate is kept.

mod action;
mod event;
mod inexact_newton;
mod line_search;
mod status;

pub use action::Action;
pub use event::Event;
pub use inexact_newton::InexactNewton;
pub use line_search::{LineSearch, LineSearchError};
pub use status::{Failure, Status};

use nalgebra::DVector;
use newtonkit_core::Observer;

use crate::{
    adapter::{JacobianInterface, PreconditionerInterface, ResidualInterface},
    convergence::ConvergenceCriteria,
    linear::LinearSolverConfig,
    output::OutputFlags,
};

/// Everything an engine needs to know about how to iterate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Settings {
    pub criteria: ConvergenceCriteria,
    pub linear: LinearSolverConfig,
    pub output: OutputFlags,
}

/// What an engine reports when it stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub status: Status,

    /// Accepted Newton steps.
    pub iters: usize,

    /// Linear iterations summed over all Newton steps.
    pub linear_iters: usize,

    /// Two-norm of the residual at the final iterate.
    ///
    /// NaN if the residual could not be evaluated at the initial guess.
    pub residual_norm: f64,

    /// Relative residual achieved by the last linear solve, or zero if no
    /// linear solve was performed.
    pub achieved_tol: f64,
}

impl Report {
    fn start() -> Self {
        Self {
            status: Status::MaxIters,
            iters: 0,
            linear_iters: 0,
            residual_norm: f64::NAN,
            achieved_tol: 0.0,
        }
    }

    fn finish(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// A nonlinear iteration engine.
pub trait NonlinearEngine {
    /// Iterates from the initial guess in `x` until a terminal status.
    ///
    /// On return `x` holds the last accepted iterate.
    fn run<A, Obs>(
        &mut self,
        adapter: &mut A,
        settings: &Settings,
        x: &mut DVector<f64>,
        observer: Obs,
    ) -> Report
    where
        A: ResidualInterface + JacobianInterface + PreconditionerInterface,
        Obs: for<'a> Observer<Event<'a>, Action>;
}
