use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, LinearOperator};

use super::{
    LinearError, LinearSolve, Limits, Method, outcome, precondition, product, relative_residual,
    residual,
};

/// Preconditioned conjugate gradient.
///
/// Requires a symmetric positive definite operator and preconditioner.
/// A non-positive curvature `pᵀ A p` is reported as a breakdown.
pub(super) fn solve<A, M>(
    a: &A,
    m: &M,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    limits: Limits,
) -> Result<LinearSolve, LinearError>
where
    A: LinearOperator + ?Sized,
    M: ApplyPreconditioner + ?Sized,
{
    let b_norm = b.norm();
    let mut r = residual(a, b, x);
    if r.norm() / b_norm <= limits.tolerance {
        return outcome(Method::Cg, 0, r.norm() / b_norm, limits.tolerance);
    }

    let mut z = precondition(m, &r);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for iter in 1..=limits.max_iters {
        if rz == 0.0 || !rz.is_finite() {
            return Err(LinearError::Breakdown {
                method: Method::Cg,
                iter,
            });
        }

        let q = product(a, &p);
        let curvature = p.dot(&q);
        if curvature <= 0.0 || !curvature.is_finite() {
            return Err(LinearError::Breakdown {
                method: Method::Cg,
                iter,
            });
        }

        let alpha = rz / curvature;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &q, 1.0);

        if r.norm() / b_norm <= limits.tolerance {
            let achieved = relative_residual(a, b, x);
            if achieved <= limits.tolerance {
                return outcome(Method::Cg, iter, achieved, limits.tolerance);
            }
        }

        z = precondition(m, &r);
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        rz = rz_next;
        p.axpy(1.0, &z, beta);
    }

    let achieved = relative_residual(a, b, x);
    outcome(Method::Cg, limits.max_iters, achieved, limits.tolerance)
}
