//! The Newton-Krylov solver facade.
//!
//! [`NewtonKrylovSolver`] ties a [`DiscreteProblem`] to a nonlinear engine.
//! It holds the configuration (convergence criteria, linear solver settings,
//! preconditioner choice, output flags), wraps the problem in a
//! [`DiscreteProblemAdapter`], and keeps statistics from the last solve.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use newtonkit_core::{DiscreteProblem, Jacobian};
//! use newtonkit_solvers::newton_krylov::NewtonKrylovSolver;
//!
//! /// `x² - 2 = 0`
//! struct Root;
//!
//! impl DiscreteProblem for Root {
//!     type Error = std::convert::Infallible;
//!
//!     fn dimension(&self) -> usize {
//!         1
//!     }
//!
//!     fn residual(&self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Self::Error> {
//!         f[0] = x[0] * x[0] - 2.0;
//!         Ok(())
//!     }
//!
//!     fn jacobian(&self, x: &DVector<f64>, jacobian: &mut Jacobian) -> Result<(), Self::Error> {
//!         jacobian.set(0, 0, 2.0 * x[0]).expect("(0, 0) is in the dense pattern");
//!         Ok(())
//!     }
//! }
//!
//! let mut solver = NewtonKrylovSolver::new(&Root);
//! let mut x = DVector::from_element(1, 1.0);
//!
//! let status = solver.solve(&mut x).unwrap();
//!
//! assert!(status.is_converged());
//! assert!((x[0] - 2f64.sqrt()).abs() < 1e-6);
//! ```

mod error;
mod statistics;


pub use error::Error;
pub use statistics::SolverStatistics;

use nalgebra::DVector;
use newtonkit_core::{DiscreteProblem, Observer, SharedPreconditioner};
use tracing::{error, info};

use crate::{
    adapter::DiscreteProblemAdapter,
    convergence::ConvergenceCriteria,
    engine::{Action, Event, InexactNewton, NonlinearEngine, Settings, Status},
    linear::LinearSolverConfig,
    output::OutputFlags,
    preconditioning::{PreconditionerPort, UnknownPreconditioner},
};

/// Solves `F(x) = 0` for a discrete problem with an inexact Newton-Krylov
/// iteration.
///
/// The solver borrows the problem for its whole lifetime. Configuration
/// persists across solves, and each solve replaces the stored statistics.
pub struct NewtonKrylovSolver<'p, P, E = InexactNewton> {
    adapter: DiscreteProblemAdapter<'p, P>,
    settings: Settings,
    engine: E,
    statistics: Option<SolverStatistics>,
}

impl<'p, P: DiscreteProblem> NewtonKrylovSolver<'p, P> {
    /// Creates a solver with the built-in engine and default settings.
    pub fn new(problem: &'p P) -> Self {
        Self::with_engine(problem, InexactNewton::default())
    }
}

impl<'p, P: DiscreteProblem, E: NonlinearEngine> NewtonKrylovSolver<'p, P, E> {
    /// Creates a solver that iterates with `engine`.
    pub fn with_engine(problem: &'p P, engine: E) -> Self {
        Self {
            adapter: DiscreteProblemAdapter::new(problem),
            settings: Settings::default(),
            engine,
            statistics: None,
        }
    }

    /// Returns the problem being solved.
    pub fn problem(&self) -> &'p P {
        self.adapter.problem()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn criteria(&self) -> &ConvergenceCriteria {
        &self.settings.criteria
    }

    /// Returns the convergence criteria for in-place configuration.
    pub fn criteria_mut(&mut self) -> &mut ConvergenceCriteria {
        &mut self.settings.criteria
    }

    pub fn linear_config(&self) -> &LinearSolverConfig {
        &self.settings.linear
    }

    /// Returns the linear solver settings for in-place configuration.
    pub fn linear_config_mut(&mut self) -> &mut LinearSolverConfig {
        &mut self.settings.linear
    }

    pub fn output_flags(&self) -> OutputFlags {
        self.settings.output
    }

    /// Selects which diagnostics are logged.
    pub fn set_output_flags(&mut self, flags: OutputFlags) {
        self.settings.output = flags;
    }

    /// Returns where the preconditioner comes from.
    pub fn preconditioner(&self) -> &PreconditionerPort {
        self.adapter.port()
    }

    /// Uses a caller-provided preconditioner, replacing any built-in one.
    ///
    /// The handle may be shared with other solvers; it is locked only while
    /// being computed or applied.
    pub fn set_preconditioner(&mut self, preconditioner: SharedPreconditioner) {
        self.adapter.set_port(PreconditionerPort::Shared(preconditioner));
    }

    /// Selects a built-in preconditioner by name.
    ///
    /// Accepts `"Jacobi"`, `"ILU"`, `"ILU0"`, or `"None"` (case-insensitive).
    /// `"None"` clears any preconditioner. A successful call replaces a
    /// shared preconditioner.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown name, leaving the current choice
    /// unchanged.
    pub fn set_preconditioner_named(&mut self, name: &str) -> Result<(), UnknownPreconditioner> {
        let port = PreconditionerPort::from_name(name)?;
        self.adapter.set_port(port);
        Ok(())
    }

    /// Removes any preconditioner.
    pub fn clear_preconditioner(&mut self) {
        self.adapter.set_port(PreconditionerPort::None);
    }

    /// Solves from the initial guess in `x`.
    ///
    /// On return `x` holds the solution, or the last accepted iterate if the
    /// solve failed.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not match the problem dimension. Failing
    /// to converge is reported through the returned [`Status`].
    pub fn solve(&mut self, x: &mut DVector<f64>) -> Result<Status, Error> {
        self.solve_observed(x, ())
    }

    /// Solves from the initial guess in `x`, reporting events to `observer`.
    ///
    /// The observer may return [`Action::StopEarly`] to end the solve with
    /// [`Status::StoppedByObserver`].
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not match the problem dimension.
    pub fn solve_observed<Obs>(
        &mut self,
        x: &mut DVector<f64>,
        observer: Obs,
    ) -> Result<Status, Error>
    where
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let expected = self.adapter.dimension();
        if x.len() != expected {
            error!(
                "initial guess has {} entries but the problem has {expected} unknowns",
                x.len()
            );
            return Err(Error::DimensionMismatch {
                expected,
                actual: x.len(),
            });
        }

        let report = self
            .engine
            .run(&mut self.adapter, &self.settings, x, observer);

        if self.settings.output.contains(OutputFlags::DETAILS) {
            info!(
                "solve finished: {:?} after {} steps, {} linear iterations, ||F|| = {:.3e}",
                report.status, report.iters, report.linear_iters, report.residual_norm
            );
        }

        self.statistics = Some(report.into());
        Ok(report.status)
    }

    /// Returns statistics from the last solve, or `None` before the first.
    pub fn statistics(&self) -> Option<&SolverStatistics> {
        self.statistics.as_ref()
    }

    /// Newton steps taken by the last solve.
    pub fn num_iters(&self) -> Option<usize> {
        self.statistics.map(|s| s.iters)
    }

    /// Two-norm of the residual at the end of the last solve.
    pub fn residual(&self) -> Option<f64> {
        self.statistics.map(|s| s.residual_norm)
    }

    /// Linear iterations summed over the last solve.
    pub fn num_lin_iters(&self) -> Option<usize> {
        self.statistics.map(|s| s.linear_iters)
    }

    /// Relative residual achieved by the final linear solve.
    pub fn achieved_tol(&self) -> Option<f64> {
        self.statistics.map(|s| s.achieved_tol)
    }
}
