use nalgebra::DVector;
use newtonkit_core::Observer;
use tracing::{debug, error, info, trace, warn};

use crate::{
    adapter::{JacobianInterface, PreconditionerInterface, ResidualInterface},
    convergence::{FailureTest, Progress, TestStatus},
    linear,
    output::OutputFlags,
};

use super::{
    Action, Event, Failure, LineSearch, LineSearchError, NonlinearEngine, Report, Settings, Status,
};

/// Inexact Newton iteration with a constant forcing term.
///
/// Each step solves `J Δx = -F` to the relative tolerance of the linear
/// solver config. A linear solve that stops short of its tolerance still
/// yields a usable direction, so its step is tried anyway. The step is then
/// globalized with the configured [`LineSearch`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InexactNewton {
    line_search: LineSearch,
}

enum StepOutcome {
    Accepted {
        x: DVector<f64>,
        f: DVector<f64>,
        step_length: f64,
    },
    Rejected,
    Stopped,
}

impl InexactNewton {
    /// Creates an engine with the given line search.
    ///
    /// # Errors
    ///
    /// Returns an error if a backtracking factor is not strictly between 0
    /// and 1.
    pub fn new(line_search: LineSearch) -> Result<Self, LineSearchError> {
        Ok(Self {
            line_search: line_search.validate()?,
        })
    }

    #[must_use]
    pub fn line_search(&self) -> LineSearch {
        self.line_search
    }

    /// Tries `x + λ Δx` for decreasing `λ` until a trial point is accepted.
    #[allow(clippy::too_many_arguments)]
    fn search<A, Obs>(
        &self,
        adapter: &mut A,
        x: &DVector<f64>,
        f: &DVector<f64>,
        dx: &DVector<f64>,
        iter: usize,
        flags: OutputFlags,
        observer: &mut Obs,
    ) -> StepOutcome
    where
        A: ResidualInterface,
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let norm = f.norm();
        let mut step_length = 1.0;
        let mut trial_f = DVector::zeros(x.len());

        for _ in 0..=self.line_search.max_reductions() {
            let trial_x = x + dx * step_length;

            let action = match adapter.compute_residual(&trial_x, &mut trial_f) {
                Ok(()) => {
                    let trial_norm = trial_f.norm();
                    if self.line_search.accepts(step_length, norm, trial_norm) {
                        return StepOutcome::Accepted {
                            x: trial_x,
                            f: trial_f,
                            step_length,
                        };
                    }
                    if flags.contains(OutputFlags::INNER_ITERATION) {
                        debug!(
                            "step length {step_length:.3e} rejected: ‖F‖₂ = {trial_norm:.6e} \
                             (was {norm:.6e})"
                        );
                    }
                    observer.observe(&Event::StepRejected {
                        iter,
                        step_length,
                        error: None,
                    })
                }
                Err(error) => {
                    if flags.contains(OutputFlags::WARNING) {
                        warn!("step length {step_length:.3e} rejected: {error}");
                    }
                    observer.observe(&Event::StepRejected {
                        iter,
                        step_length,
                        error: Some(&error),
                    })
                }
            };

            if let Some(Action::StopEarly) = action {
                return StepOutcome::Stopped;
            }
            step_length = self.line_search.reduce(step_length);
        }

        StepOutcome::Rejected
    }
}

impl NonlinearEngine for InexactNewton {
    fn run<A, Obs>(
        &mut self,
        adapter: &mut A,
        settings: &Settings,
        x: &mut DVector<f64>,
        mut observer: Obs,
    ) -> Report
    where
        A: ResidualInterface + JacobianInterface + PreconditionerInterface,
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let flags = settings.output;
        let criteria = &settings.criteria;
        let mut report = Report::start();

        if flags.contains(OutputFlags::PARAMETERS) {
            info!(
                "inexact Newton: {} unknowns, {:?}, {:?}, {:?}",
                x.len(),
                criteria,
                settings.linear,
                self.line_search
            );
        }

        let mut f = DVector::zeros(x.len());
        if let Err(error) = adapter.compute_residual(x, &mut f) {
            error!("residual evaluation failed at the initial guess: {error}");
            return report.finish(Status::Failed(Failure::ResidualEvaluation));
        }
        let initial = f.clone();
        let mut update: Option<DVector<f64>> = None;

        loop {
            let iter = report.iters;
            report.residual_norm = f.norm();

            let progress = Progress {
                iter,
                x: &*x,
                residual: &f,
                initial_residual: &initial,
                update: update.as_ref(),
            };
            let status = criteria.check(&progress);

            if flags.contains(OutputFlags::OUTER_ITERATION) {
                info!(
                    "iteration {iter}: ‖F‖₂ = {:.6e}, {status:?}",
                    report.residual_norm
                );
            }
            if flags.contains(OutputFlags::TEST_DETAILS) {
                for m in criteria.measure(&progress) {
                    debug!(
                        "  {} test: value = {:?}, tolerance = {:.3e}, satisfied = {}",
                        m.criterion, m.value, m.tolerance, m.satisfied
                    );
                }
            }

            let action = observer.observe(&Event::Evaluated {
                iter,
                x: &*x,
                residual_norm: report.residual_norm,
                status,
            });

            match status {
                TestStatus::Converged => return report.finish(Status::Converged),
                TestStatus::Failed(FailureTest::MaxIters) => {
                    if flags.contains(OutputFlags::OUTER_ITERATION_STATUS_TEST) {
                        info!("iteration cap of {} reached", criteria.max_iters());
                    }
                    return report.finish(Status::MaxIters);
                }
                TestStatus::Failed(FailureTest::NonFiniteResidual) => {
                    error!("residual norm is not finite at iteration {iter}");
                    return report.finish(Status::Failed(Failure::NonFiniteResidual));
                }
                TestStatus::Unconverged => {}
            }
            if let Some(Action::StopEarly) = action {
                return report.finish(Status::StoppedByObserver);
            }

            if let Err(error) = adapter.compute_jacobian(x) {
                error!("jacobian assembly failed at iteration {iter}: {error}");
                return report.finish(Status::Failed(Failure::JacobianEvaluation));
            }
            if let Err(error) = adapter.compute_preconditioner(x) {
                error!("preconditioner computation failed at iteration {iter}: {error}");
                return report.finish(Status::Failed(Failure::PreconditionerEvaluation));
            }

            let rhs = -&f;
            let mut dx = DVector::zeros(x.len());
            let solved = match (adapter.jacobian(), adapter.preconditioner()) {
                (Some(jacobian), Ok(preconditioner)) => {
                    linear::solve(&settings.linear, jacobian, &preconditioner, &rhs, &mut dx)
                }
                (None, _) => {
                    error!("no jacobian available at iteration {iter}");
                    return report.finish(Status::Failed(Failure::JacobianEvaluation));
                }
                (_, Err(error)) => {
                    error!("preconditioner unavailable at iteration {iter}: {error}");
                    return report.finish(Status::Failed(Failure::PreconditionerEvaluation));
                }
            };
            let solve = match solved {
                Ok(solve) => solve,
                Err(error) => {
                    error!("linear solve failed at iteration {iter}: {error}");
                    return report.finish(Status::Failed(Failure::LinearSolve));
                }
            };

            report.linear_iters += solve.iters;
            report.achieved_tol = solve.achieved_tol;

            if flags.contains(OutputFlags::LINEAR_SOLVER_DETAILS) {
                debug!(
                    "{} solve: {} iterations, achieved tolerance {:.3e}",
                    settings.linear.method(),
                    solve.iters,
                    solve.achieved_tol
                );
            }
            if !solve.converged && flags.contains(OutputFlags::WARNING) {
                warn!(
                    "linear solve stopped at {:.3e}, above tolerance {:.3e}; using the step anyway",
                    solve.achieved_tol,
                    settings.linear.tolerance()
                );
            }
            if flags.contains(OutputFlags::DEBUG) {
                trace!("‖Δx‖₂ = {:.6e}", dx.norm());
            }

            if let Some(Action::StopEarly) = observer.observe(&Event::LinearSolved { iter, solve }) {
                return report.finish(Status::StoppedByObserver);
            }

            match self.search(adapter, x, &f, &dx, iter, flags, &mut observer) {
                StepOutcome::Accepted {
                    x: trial_x,
                    f: trial_f,
                    step_length,
                } => {
                    if flags.contains(OutputFlags::DETAILS) {
                        debug!("accepted step length {step_length:.3e}");
                    }
                    update = Some(dx * step_length);
                    *x = trial_x;
                    f = trial_f;
                    report.iters += 1;
                }
                StepOutcome::Rejected => {
                    error!("line search found no acceptable step at iteration {iter}");
                    return report.finish(Status::Failed(Failure::LineSearch));
                }
                StepOutcome::Stopped => return report.finish(Status::StoppedByObserver),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use newtonkit_core::{DiscreteProblem, Jacobian};
    use thiserror::Error;

    use crate::adapter::DiscreteProblemAdapter;

    #[derive(Debug, Error)]
    #[error("outside the domain")]
    struct Domain;

    /// A scalar equation `g(x) = 0` with derivative `dg`.
    struct Scalar {
        g: fn(f64) -> Option<f64>,
        dg: fn(f64) -> f64,
    }

    impl DiscreteProblem for Scalar {
        type Error = Domain;

        fn dimension(&self) -> usize {
            1
        }

        fn residual(&self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Domain> {
            f[0] = (self.g)(x[0]).ok_or(Domain)?;
            Ok(())
        }

        fn jacobian(&self, x: &DVector<f64>, jacobian: &mut Jacobian) -> Result<(), Domain> {
            jacobian.set(0, 0, (self.dg)(x[0])).map_err(|_| Domain)
        }
    }

    fn settings(max_iters: usize, abs: f64) -> Settings {
        let mut settings = Settings::default();
        settings.criteria.set_max_iters(max_iters);
        settings.criteria.set_abs_residual(abs).unwrap();
        settings
    }

    #[test]
    fn square_root_converges_quadratically() {
        let problem = Scalar {
            g: |x| Some(x * x - 2.0),
            dg: |x| 2.0 * x,
        };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 1.0);

        let report =
            InexactNewton::default().run(&mut adapter, &settings(20, 1e-12), &mut x, ());

        assert_eq!(report.status, Status::Converged);
        assert!(report.iters <= 6);
        assert_relative_eq!(x[0], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert!(report.residual_norm <= 1e-12);
    }

    #[test]
    fn backtracking_rescues_overshooting_step() {
        // Full Newton steps on atan diverge from x = 10.
        let problem = Scalar {
            g: |x| Some(x.atan()),
            dg: |x| 1.0 / (1.0 + x * x),
        };

        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 10.0);
        let mut engine = InexactNewton::new(LineSearch::Backtrack {
            max_reductions: 20,
            factor: 0.5,
        })
        .unwrap();
        let report = engine.run(&mut adapter, &settings(50, 1e-10), &mut x, ());

        assert_eq!(report.status, Status::Converged);
        assert_relative_eq!(x[0], 0.0, epsilon = 1e-9);

        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 10.0);
        let mut full = InexactNewton::new(LineSearch::FullStep).unwrap();
        let report = full.run(&mut adapter, &settings(50, 1e-10), &mut x, ());

        assert!(!report.status.is_converged());
    }

    #[test]
    fn failed_trial_evaluation_is_retried_shorter() {
        let problem = Scalar {
            g: |x| (x > 0.0).then(|| x.ln()),
            dg: |x| 1.0 / x,
        };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 3.0);

        let mut failed_trials = 0;
        let observer = |event: &Event<'_>| {
            if let Event::StepRejected { error: Some(_), .. } = event {
                failed_trials += 1;
            }
            None::<Action>
        };
        let report =
            InexactNewton::default().run(&mut adapter, &settings(30, 1e-12), &mut x, observer);

        assert_eq!(report.status, Status::Converged);
        assert!(failed_trials >= 1);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn observer_stop_keeps_initial_guess() {
        let problem = Scalar {
            g: |x| Some(x * x - 2.0),
            dg: |x| 2.0 * x,
        };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 1.0);

        let observer = |_event: &Event<'_>| Some(Action::StopEarly);
        let report =
            InexactNewton::default().run(&mut adapter, &settings(20, 1e-12), &mut x, observer);

        assert_eq!(report.status, Status::StoppedByObserver);
        assert_eq!(report.iters, 0);
        assert_eq!(report.linear_iters, 0);
        assert_eq!(x[0], 1.0);
    }

    #[test]
    fn singular_jacobian_fails_linear_solve() {
        let problem = Scalar {
            g: |x| Some(x * x + 1.0),
            dg: |x| 2.0 * x,
        };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let mut x = DVector::from_element(1, 0.0);
        let mut settings = settings(10, 1e-12);
        settings.linear.set_method(linear::Method::Lu).unwrap();

        let report = InexactNewton::default().run(&mut adapter, &settings, &mut x, ());

        assert_eq!(report.status, Status::Failed(Failure::LinearSolve));
        assert_eq!(x[0], 0.0);
    }
}
