use std::{
    error::Error as StdError,
    sync::{Arc, Mutex},
};

use nalgebra::DVector;
use thiserror::Error;

use crate::Jacobian;

/// Errors that can occur when computing a preconditioner.
#[derive(Debug, Error)]
pub enum PreconditionerError {
    #[error("zero pivot in row {row}")]
    ZeroPivot { row: usize },

    #[error("diagonal entry ({row}, {row}) is not in the jacobian pattern")]
    MissingDiagonal { row: usize },

    #[error("preconditioner failed: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

impl PreconditionerError {
    /// Wraps any error as a preconditioner failure.
    pub fn other<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Applies an approximate inverse `z = M⁻¹ r`.
///
/// This is the only capability a Krylov solver needs from a preconditioner.
pub trait ApplyPreconditioner {
    /// Computes `z = M⁻¹ r`, overwriting `z`.
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>);
}

/// A preconditioner whose state is recomputed at each Newton step.
pub trait Preconditioner: ApplyPreconditioner {
    /// Recomputes internal state at the candidate solution `x`.
    ///
    /// `jacobian` holds the Jacobian assembled at the same `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preconditioner cannot be built at `x`.
    fn compute(&mut self, x: &DVector<f64>, jacobian: &Jacobian)
    -> Result<(), PreconditionerError>;
}

/// A preconditioner shared between its creator and one or more solvers.
///
/// The preconditioner lives as long as its longest holder. Solvers lock it
/// only while recomputing or applying it.
pub type SharedPreconditioner = Arc<Mutex<dyn Preconditioner + Send>>;

/// Wraps a preconditioner for shared use.
pub fn shared<P>(preconditioner: P) -> SharedPreconditioner
where
    P: Preconditioner + Send + 'static,
{
    Arc::new(Mutex::new(preconditioner))
}

/// The identity preconditioner, `M = I`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl ApplyPreconditioner for Identity {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        z.copy_from(r);
    }
}

impl Preconditioner for Identity {
    fn compute(&mut self, _x: &DVector<f64>, _jacobian: &Jacobian) -> Result<(), PreconditionerError> {
        Ok(())
    }
}
