//! The bridge between a [`DiscreteProblem`] and a nonlinear engine.
//!
//! A nonlinear engine drives the iteration but knows nothing about the
//! problem. It asks for what it needs through three capability traits:
//!
//! - [`ResidualInterface`]: evaluate `F(x)`
//! - [`JacobianInterface`]: assemble `J(x)`
//! - [`PreconditionerInterface`]: recompute the preconditioner at `x` and
//!   hand it to the linear solver
//!
//! [`DiscreteProblemAdapter`] implements all three for any problem. It owns
//! the Jacobian storage, which is allocated on the first request and then
//! zeroed and refilled in place at every later one.

mod error;

pub use error::EvalError;

use nalgebra::DVector;
use newtonkit_core::{DiscreteProblem, Jacobian, Preconditioner};

use crate::preconditioning::{ActivePreconditioner, Builtin, PreconditionerPort};

/// Evaluates the residual of a nonlinear system.
pub trait ResidualInterface {
    /// Evaluates `F(x)` into `f`.
    ///
    /// # Errors
    ///
    /// Returns an error if the residual cannot be evaluated or is not finite.
    fn compute_residual(&mut self, x: &DVector<f64>, f: &mut DVector<f64>)
    -> Result<(), EvalError>;
}

/// Assembles the Jacobian of a nonlinear system.
pub trait JacobianInterface {
    /// Assembles `J(x)` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the Jacobian cannot be assembled.
    fn compute_jacobian(&mut self, x: &DVector<f64>) -> Result<&Jacobian, EvalError>;

    /// Returns the most recently assembled Jacobian.
    fn jacobian(&self) -> Option<&Jacobian>;
}

/// Maintains the preconditioner used by the inner linear solves.
pub trait PreconditionerInterface {
    /// Recomputes the preconditioner at `x`.
    ///
    /// Called after [`JacobianInterface::compute_jacobian`] at the same `x`.
    /// The assembled Jacobian is the only input a preconditioner receives
    /// besides `x`; there is no separate parameter list.
    ///
    /// # Errors
    ///
    /// Returns an error if the preconditioner cannot be computed.
    fn compute_preconditioner(&mut self, x: &DVector<f64>) -> Result<(), EvalError>;

    /// Returns the preconditioner to apply during the next linear solve.
    ///
    /// # Errors
    ///
    /// Returns an error if a shared preconditioner cannot be locked.
    fn preconditioner(&self) -> Result<ActivePreconditioner<'_>, EvalError>;
}

/// Adapts a [`DiscreteProblem`] to the engine's capability traits.
pub struct DiscreteProblemAdapter<'p, P> {
    problem: &'p P,
    jacobian: Option<Jacobian>,
    assembled: bool,
    port: PreconditionerPort,
    builtin: Option<Builtin>,
}

impl<'p, P: DiscreteProblem> DiscreteProblemAdapter<'p, P> {
    /// Creates an adapter with no Jacobian storage and no preconditioner.
    pub fn new(problem: &'p P) -> Self {
        Self {
            problem,
            jacobian: None,
            assembled: false,
            port: PreconditionerPort::None,
            builtin: None,
        }
    }

    /// Returns the adapted problem.
    pub fn problem(&self) -> &'p P {
        self.problem
    }

    /// Returns the number of unknowns.
    pub fn dimension(&self) -> usize {
        self.problem.dimension()
    }

    /// Returns where the preconditioner comes from.
    pub fn port(&self) -> &PreconditionerPort {
        &self.port
    }

    /// Replaces the preconditioner source, discarding any built-in state.
    pub fn set_port(&mut self, port: PreconditionerPort) {
        self.port = port;
        self.builtin = None;
    }

    fn check_len(&self, v: &DVector<f64>) -> Result<(), EvalError> {
        let expected = self.dimension();
        if v.len() == expected {
            Ok(())
        } else {
            Err(EvalError::DimensionMismatch {
                expected,
                actual: v.len(),
            })
        }
    }
}

impl<P: DiscreteProblem> ResidualInterface for DiscreteProblemAdapter<'_, P> {
    fn compute_residual(
        &mut self,
        x: &DVector<f64>,
        f: &mut DVector<f64>,
    ) -> Result<(), EvalError> {
        self.check_len(x)?;
        self.check_len(f)?;

        self.problem.residual(x, f).map_err(EvalError::residual)?;

        if let Some(index) = f.iter().position(|v| !v.is_finite()) {
            return Err(EvalError::NonFiniteResidual { index });
        }
        Ok(())
    }
}

impl<P: DiscreteProblem> JacobianInterface for DiscreteProblemAdapter<'_, P> {
    fn compute_jacobian(&mut self, x: &DVector<f64>) -> Result<&Jacobian, EvalError> {
        self.check_len(x)?;
        self.assembled = false;

        let jacobian = match &mut self.jacobian {
            Some(jacobian) => {
                jacobian.clear();
                jacobian
            }
            slot @ None => {
                let jacobian = Jacobian::new(self.problem.jacobian_pattern())?;
                let expected = self.problem.dimension();
                if jacobian.dim() != expected {
                    return Err(EvalError::DimensionMismatch {
                        expected,
                        actual: jacobian.dim(),
                    });
                }
                slot.insert(jacobian)
            }
        };

        self.problem
            .jacobian(x, jacobian)
            .map_err(EvalError::jacobian)?;
        self.assembled = true;
        Ok(jacobian)
    }

    fn jacobian(&self) -> Option<&Jacobian> {
        self.jacobian.as_ref().filter(|_| self.assembled)
    }
}

impl<P: DiscreteProblem> PreconditionerInterface for DiscreteProblemAdapter<'_, P> {
    /// Without an attached preconditioner this is a successful no-op.
    fn compute_preconditioner(&mut self, x: &DVector<f64>) -> Result<(), EvalError> {
        if self.port.is_none() {
            return Ok(());
        }
        self.check_len(x)?;

        let jacobian = match (&self.jacobian, self.assembled) {
            (Some(jacobian), true) => jacobian,
            _ => return Err(EvalError::MissingJacobian),
        };

        match &self.port {
            PreconditionerPort::None => Ok(()),
            PreconditionerPort::Builtin(kind) => self
                .builtin
                .get_or_insert_with(|| kind.build())
                .compute(x, jacobian)
                .map_err(EvalError::Preconditioner),
            PreconditionerPort::Shared(handle) => handle
                .lock()
                .map_err(|_| EvalError::PoisonedPreconditioner)?
                .compute(x, jacobian)
                .map_err(EvalError::Preconditioner),
        }
    }

    /// Returns the identity when no preconditioner is attached or a built-in
    /// one has not been computed yet.
    fn preconditioner(&self) -> Result<ActivePreconditioner<'_>, EvalError> {
        match (&self.port, &self.builtin) {
            (PreconditionerPort::Builtin(_), Some(builtin)) => {
                Ok(ActivePreconditioner::Builtin(builtin))
            }
            (PreconditionerPort::Shared(handle), _) => handle
                .lock()
                .map(ActivePreconditioner::Shared)
                .map_err(|_| EvalError::PoisonedPreconditioner),
            _ => Ok(ActivePreconditioner::Identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        cell::Cell,
        sync::{Arc, Mutex},
    };

    use nalgebra_sparse::pattern::SparsityPattern;
    use newtonkit_core::{ApplyPreconditioner, PreconditionerError, dense_pattern, shared};
    use thiserror::Error;

    use crate::preconditioning::BuiltinPreconditioner;

    #[derive(Debug, Error)]
    #[error("evaluation failed")]
    struct Failed;

    /// `F_i(x) = x_i² - c`, assembled by accumulating into the Jacobian.
    struct Squares {
        n: usize,
        c: f64,
    }

    impl DiscreteProblem for Squares {
        type Error = Failed;

        fn dimension(&self) -> usize {
            self.n
        }

        fn residual(&self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Failed> {
            for i in 0..self.n {
                f[i] = x[i] * x[i] - self.c;
            }
            Ok(())
        }

        fn jacobian(&self, x: &DVector<f64>, jacobian: &mut Jacobian) -> Result<(), Failed> {
            for i in 0..self.n {
                jacobian.add(i, i, x[i]).map_err(|_| Failed)?;
                jacobian.add(i, i, x[i]).map_err(|_| Failed)?;
            }
            Ok(())
        }
    }

    /// `F_i(x) = x_i² + x_i`, counting requests for its sparsity pattern.
    struct CountsPattern {
        pattern_calls: Cell<usize>,
    }

    impl DiscreteProblem for CountsPattern {
        type Error = Failed;

        fn dimension(&self) -> usize {
            2
        }

        fn jacobian_pattern(&self) -> SparsityPattern {
            self.pattern_calls.set(self.pattern_calls.get() + 1);
            dense_pattern(2)
        }

        fn residual(&self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Failed> {
            f.copy_from(&x.map(|v| v * v + v));
            Ok(())
        }

        fn jacobian(&self, x: &DVector<f64>, jacobian: &mut Jacobian) -> Result<(), Failed> {
            for i in 0..2 {
                jacobian.set(i, i, 2.0 * x[i] + 1.0).map_err(|_| Failed)?;
            }
            Ok(())
        }
    }

    /// Produces a non-finite residual or fails the Jacobian on demand.
    struct Broken;

    impl DiscreteProblem for Broken {
        type Error = Failed;

        fn dimension(&self) -> usize {
            2
        }

        fn residual(&self, _x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Failed> {
            f[0] = 1.0;
            f[1] = f64::INFINITY;
            Ok(())
        }

        fn jacobian(&self, _x: &DVector<f64>, _jacobian: &mut Jacobian) -> Result<(), Failed> {
            Err(Failed)
        }
    }

    /// Counts how often it is recomputed and scales by the count.
    #[derive(Default)]
    struct Counting {
        computed: usize,
    }

    impl ApplyPreconditioner for Counting {
        fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
            #[allow(clippy::cast_precision_loss)]
            let scale = self.computed as f64;
            z.copy_from(&(r * scale));
        }
    }

    impl Preconditioner for Counting {
        fn compute(
            &mut self,
            _x: &DVector<f64>,
            _jacobian: &Jacobian,
        ) -> Result<(), PreconditionerError> {
            self.computed += 1;
            Ok(())
        }
    }

    #[test]
    fn residual_is_evaluated_into_caller_storage() {
        let problem = Squares { n: 3, c: 4.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);

        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let mut f = DVector::zeros(3);
        adapter.compute_residual(&x, &mut f).unwrap();

        assert_eq!(f, DVector::from_vec(vec![-3.0, 0.0, 5.0]));
    }

    #[test]
    fn jacobian_is_overwritten_not_accumulated() {
        let problem = Squares { n: 3, c: 1.0 };
        let x1 = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let x2 = DVector::from_vec(vec![-1.0, 0.5, 4.0]);

        let mut reused = DiscreteProblemAdapter::new(&problem);
        reused.compute_jacobian(&x1).unwrap();
        let second = reused.compute_jacobian(&x2).unwrap().clone();

        let mut fresh = DiscreteProblemAdapter::new(&problem);
        let expected = fresh.compute_jacobian(&x2).unwrap();

        assert_eq!(&second, expected);
        assert_eq!(second.diagonal(), DVector::from_vec(vec![-2.0, 1.0, 8.0]));
    }

    #[test]
    fn jacobian_storage_is_allocated_once_on_first_request() {
        let problem = CountsPattern {
            pattern_calls: Cell::new(0),
        };
        let mut adapter = DiscreteProblemAdapter::new(&problem);

        let mut f = DVector::zeros(2);
        adapter
            .compute_residual(&DVector::from_vec(vec![1.0, 1.0]), &mut f)
            .unwrap();
        assert_eq!(problem.pattern_calls.get(), 0);
        assert!(adapter.jacobian().is_none());

        let first = adapter
            .compute_jacobian(&DVector::from_vec(vec![1.0, 1.0]))
            .unwrap()
            .as_csr()
            .values()
            .as_ptr();
        let second = adapter
            .compute_jacobian(&DVector::from_vec(vec![2.0, 3.0]))
            .unwrap()
            .as_csr()
            .values()
            .as_ptr();

        assert_eq!(problem.pattern_calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(
            adapter.jacobian().unwrap().diagonal(),
            DVector::from_vec(vec![5.0, 7.0])
        );
    }

    #[test]
    fn non_finite_residual_is_an_error() {
        let mut adapter = DiscreteProblemAdapter::new(&Broken);
        let x = DVector::zeros(2);
        let mut f = DVector::zeros(2);

        let result = adapter.compute_residual(&x, &mut f);

        assert!(matches!(result, Err(EvalError::NonFiniteResidual { index: 1 })));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let problem = Squares { n: 3, c: 1.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let x = DVector::zeros(2);

        let result = adapter.compute_jacobian(&x);

        assert!(matches!(
            result,
            Err(EvalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn failed_assembly_leaves_no_jacobian() {
        let mut adapter = DiscreteProblemAdapter::new(&Broken);
        let x = DVector::zeros(2);

        assert!(matches!(
            adapter.compute_jacobian(&x),
            Err(EvalError::Jacobian(_))
        ));
        assert!(adapter.jacobian().is_none());
    }

    #[test]
    fn no_preconditioner_means_identity() {
        let problem = Squares { n: 2, c: 1.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let x = DVector::from_vec(vec![1.0, 1.0]);

        // Succeeds even before a Jacobian exists.
        adapter.compute_preconditioner(&x).unwrap();

        let r = DVector::from_vec(vec![3.0, -1.0]);
        let mut z = DVector::zeros(2);
        adapter.preconditioner().unwrap().apply(&r, &mut z);
        assert_eq!(z, r);
    }

    #[test]
    fn builtin_preconditioner_needs_a_jacobian() {
        let problem = Squares { n: 2, c: 1.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        adapter.set_port(PreconditionerPort::Builtin(BuiltinPreconditioner::Jacobi));
        let x = DVector::from_vec(vec![1.0, 2.0]);

        assert!(matches!(
            adapter.compute_preconditioner(&x),
            Err(EvalError::MissingJacobian)
        ));

        adapter.compute_jacobian(&x).unwrap();
        adapter.compute_preconditioner(&x).unwrap();

        let r = DVector::from_vec(vec![2.0, 4.0]);
        let mut z = DVector::zeros(2);
        adapter.preconditioner().unwrap().apply(&r, &mut z);
        assert_eq!(z, DVector::from_vec(vec![1.0, 1.0]));
    }

    #[test]
    fn shared_preconditioner_is_computed_through_the_adapter() {
        let counting = Arc::new(Mutex::new(Counting::default()));
        let problem = Squares { n: 2, c: 1.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        adapter.set_port(PreconditionerPort::Shared(counting.clone()));
        let x = DVector::from_vec(vec![1.0, 2.0]);

        adapter.compute_jacobian(&x).unwrap();
        adapter.compute_preconditioner(&x).unwrap();
        adapter.compute_preconditioner(&x).unwrap();

        {
            let r = DVector::from_vec(vec![1.0, 1.0]);
            let mut z = DVector::zeros(2);
            adapter.preconditioner().unwrap().apply(&r, &mut z);
            assert_eq!(z, DVector::from_vec(vec![2.0, 2.0]));
        }
        assert_eq!(counting.lock().unwrap().computed, 2);
    }

    #[test]
    fn replacing_the_port_discards_builtin_state() {
        let problem = Squares { n: 2, c: 1.0 };
        let mut adapter = DiscreteProblemAdapter::new(&problem);
        let x = DVector::from_vec(vec![1.0, 2.0]);
        adapter.set_port(PreconditionerPort::Builtin(BuiltinPreconditioner::Ilu0));
        adapter.compute_jacobian(&x).unwrap();
        adapter.compute_preconditioner(&x).unwrap();

        adapter.set_port(PreconditionerPort::Shared(shared(Counting::default())));

        assert!(matches!(
            adapter.preconditioner(),
            Ok(ActivePreconditioner::Shared(_))
        ));
    }
}
