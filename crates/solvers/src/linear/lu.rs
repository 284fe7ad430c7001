use nalgebra::DVector;
use newtonkit_core::Jacobian;

use super::{LinearError, LinearSolve, Method, outcome, relative_residual};

/// Direct solve through a dense LU factorization with partial pivoting.
///
/// Counts as a single iteration. The achieved tolerance is the true relative
/// residual, so an ill-conditioned matrix can still miss the tolerance.
pub(super) fn solve(
    jacobian: &Jacobian,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    tolerance: f64,
) -> Result<LinearSolve, LinearError> {
    let solution = jacobian
        .to_dense()
        .lu()
        .solve(b)
        .ok_or(LinearError::Singular)?;
    x.copy_from(&solution);

    let achieved = relative_residual(jacobian, b, x);
    outcome(Method::Lu, 1, achieved, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn solves_exactly() {
        let dense = DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 1.0, 1.0]);
        let a = Jacobian::from_dense(&dense).unwrap();
        let b = DVector::from_vec(vec![4.0, 3.0]);
        let mut x = DVector::zeros(2);

        let result = solve(&a, &b, &mut x, 1e-12).unwrap();

        assert_eq!(result.iters, 1);
        assert!(result.converged);
        assert_relative_eq!(x, DVector::from_vec(vec![1.0, 2.0]), epsilon = 1e-14);
    }

    #[test]
    fn singular_matrix_errors() {
        let dense = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let a = Jacobian::from_dense(&dense).unwrap();
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let mut x = DVector::zeros(2);

        assert_eq!(solve(&a, &b, &mut x, 1e-12), Err(LinearError::Singular));
    }
}
