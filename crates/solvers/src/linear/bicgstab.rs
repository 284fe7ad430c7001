use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, LinearOperator};

use super::{
    LinearError, LinearSolve, Limits, Method, outcome, precondition, product, relative_residual,
    residual,
};

/// Stabilized bi-conjugate gradient with right preconditioning.
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
    let breakdown = |iter| LinearError::Breakdown {
        method: Method::BiCgStab,
        iter,
    };

    let b_norm = b.norm();
    let mut r = residual(a, b, x);
    if r.norm() / b_norm <= limits.tolerance {
        return outcome(Method::BiCgStab, 0, r.norm() / b_norm, limits.tolerance);
    }

    let shadow = r.clone();
    let n = b.len();
    let mut p = DVector::zeros(n);
    let mut v = DVector::zeros(n);
    let mut rho_prev = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;

    for iter in 1..=limits.max_iters {
        let rho = shadow.dot(&r);
        if rho == 0.0 || !rho.is_finite() {
            return Err(breakdown(iter));
        }

        if iter == 1 {
            p.copy_from(&r);
        } else {
            let beta = (rho / rho_prev) * (alpha / omega);
            // p = r + β (p - ω v)
            p.axpy(-omega, &v, 1.0);
            p.axpy(1.0, &r, beta);
        }

        let p_hat = precondition(m, &p);
        v = product(a, &p_hat);
        let sigma = shadow.dot(&v);
        if sigma == 0.0 {
            return Err(breakdown(iter));
        }
        alpha = rho / sigma;

        let s = &r - &v * alpha;
        if s.norm() / b_norm <= limits.tolerance {
            x.axpy(alpha, &p_hat, 1.0);
            let achieved = relative_residual(a, b, x);
            return outcome(Method::BiCgStab, iter, achieved, limits.tolerance);
        }

        let s_hat = precondition(m, &s);
        let t = product(a, &s_hat);
        let tt = t.dot(&t);
        if tt == 0.0 {
            return Err(breakdown(iter));
        }
        omega = t.dot(&s) / tt;

        x.axpy(alpha, &p_hat, 1.0);
        x.axpy(omega, &s_hat, 1.0);
        r = s - &t * omega;

        if r.norm() / b_norm <= limits.tolerance {
            let achieved = relative_residual(a, b, x);
            if achieved <= limits.tolerance {
                return outcome(Method::BiCgStab, iter, achieved, limits.tolerance);
            }
        }

        if omega == 0.0 {
            return Err(breakdown(iter));
        }
        rho_prev = rho;
    }

    let achieved = relative_residual(a, b, x);
    outcome(Method::BiCgStab, limits.max_iters, achieved, limits.tolerance)
}
