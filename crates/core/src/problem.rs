use nalgebra::DVector;
use nalgebra_sparse::pattern::SparsityPattern;

use crate::{Jacobian, dense_pattern};

/// Defines a discrete nonlinear problem `F(x) = 0` to be solved.
///
/// A discrete problem knows its number of unknowns, evaluates its residual
/// at a candidate solution, and assembles its Jacobian into caller-provided
/// storage. Evaluations are assumed to be expensive, so solvers call these
/// methods only when they need fresh values.
///
/// The dimension must stay fixed for the lifetime of the problem.
pub trait DiscreteProblem {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of unknowns (and residual components).
    fn dimension(&self) -> usize;

    /// Returns the sparsity pattern of the Jacobian.
    ///
    /// Called once, before the first Jacobian assembly, to allocate storage.
    /// The default is a dense pattern. Override it for sparse problems.
    fn jacobian_pattern(&self) -> SparsityPattern {
        dense_pattern(self.dimension())
    }

    /// Evaluates the residual `F(x)` into `f`.
    ///
    /// Both `x` and `f` have [`Self::dimension`] entries.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the residual cannot be evaluated at `x`.
    fn residual(&self, x: &DVector<f64>, f: &mut DVector<f64>) -> Result<(), Self::Error>;

    /// Assembles the Jacobian `∂F/∂x` at `x` into `jacobian`.
    ///
    /// The storage is zeroed before each call, so implementations may either
    /// [`Jacobian::set`] or accumulate with [`Jacobian::add`].
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the Jacobian cannot be assembled at `x`.
    fn jacobian(&self, x: &DVector<f64>, jacobian: &mut Jacobian) -> Result<(), Self::Error>;
}
