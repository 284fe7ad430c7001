use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, LinearOperator};

use super::{
    LinearError, LinearSolve, Limits, Method, outcome, precondition, product, relative_residual,
    residual,
};

/// Conjugate gradient squared with right preconditioning.
///
/// The shadow residual is fixed to the initial residual. The recurrence
/// residual can drift from the true one, so convergence is only accepted
/// after the true residual confirms it.
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
        return outcome(Method::Cgs, 0, r.norm() / b_norm, limits.tolerance);
    }

    let shadow = r.clone();
    let n = b.len();
    let mut p = DVector::zeros(n);
    let mut q = DVector::zeros(n);
    let mut rho_prev = 1.0;

    for iter in 1..=limits.max_iters {
        let rho = shadow.dot(&r);
        if rho == 0.0 || !rho.is_finite() {
            return Err(LinearError::Breakdown {
                method: Method::Cgs,
                iter,
            });
        }

        let u = if iter == 1 {
            p.copy_from(&r);
            r.clone()
        } else {
            let beta = rho / rho_prev;
            let u = &r + &q * beta;
            // p = u + β (q + β p)
            p = &u + (&q + &p * beta) * beta;
            u
        };

        let p_hat = precondition(m, &p);
        let v_hat = product(a, &p_hat);
        let sigma = shadow.dot(&v_hat);
        if sigma == 0.0 {
            return Err(LinearError::Breakdown {
                method: Method::Cgs,
                iter,
            });
        }

        let alpha = rho / sigma;
        q = &u - &v_hat * alpha;
        let u_hat = precondition(m, &(&u + &q));
        x.axpy(alpha, &u_hat, 1.0);
        let q_hat = product(a, &u_hat);
        r.axpy(-alpha, &q_hat, 1.0);

        if r.norm() / b_norm <= limits.tolerance {
            let achieved = relative_residual(a, b, x);
            if achieved <= limits.tolerance {
                return outcome(Method::Cgs, iter, achieved, limits.tolerance);
            }
        }

        rho_prev = rho;
    }

    let achieved = relative_residual(a, b, x);
    outcome(Method::Cgs, limits.max_iters, achieved, limits.tolerance)
}
