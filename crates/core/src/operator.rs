use nalgebra::DVector;

/// A square linear operator `y = A x`.
///
/// Krylov solvers only need matrix-vector products, so anything that can
/// apply itself to a vector can be handed to them.
pub trait LinearOperator {
    /// Returns the operator dimension (number of rows and columns).
    fn dim(&self) -> usize;

    /// Computes `y = A x`, overwriting `y`.
    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>);
}
