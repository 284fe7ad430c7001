use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, LinearOperator};

use super::{
    LinearError, LinearSolve, Limits, Method, outcome, precondition, product, relative_residual,
    residual,
};

/// Transpose-free quasi-minimal residual with right preconditioning.
///
/// Works on `B = A M⁻¹` and accumulates the update `z`, so the iterate is
/// `x₀ + M⁻¹ z`. Each half-step counts as one iteration. The quasi-residual
/// bound `τₘ √(m + 1)` decides when the true residual is worth checking.
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
        method: Method::Tfqmr,
        iter,
    };
    let apply_b = |v: &DVector<f64>| product(a, &precondition(m, v));

    let b_norm = b.norm();
    let r0 = residual(a, b, x);
    if r0.norm() / b_norm <= limits.tolerance {
        return outcome(Method::Tfqmr, 0, r0.norm() / b_norm, limits.tolerance);
    }

    let x0 = x.clone();
    let n = b.len();
    let mut z = DVector::zeros(n);
    let mut d = DVector::zeros(n);
    let mut w = r0.clone();
    let mut u = r0.clone();
    let mut bu = apply_b(&u);
    let mut v = bu.clone();
    let mut tau = r0.norm();
    let mut theta = 0.0_f64;
    let mut eta = 0.0;
    let mut alpha = 0.0;
    let mut rho = r0.dot(&r0);
    let shadow = r0;

    let update_x = |x: &mut DVector<f64>, z: &DVector<f64>| {
        x.copy_from(&x0);
        x.axpy(1.0, &precondition(m, z), 1.0);
    };

    for step in 0..limits.max_iters {
        let iter = step + 1;
        let even = step % 2 == 0;

        if even {
            let sigma = shadow.dot(&v);
            if sigma == 0.0 || !sigma.is_finite() {
                return Err(breakdown(iter));
            }
            alpha = rho / sigma;
        }

        w.axpy(-alpha, &bu, 1.0);
        // d = u + (θ² η / α) d
        d.axpy(1.0, &u, theta * theta * eta / alpha);

        theta = w.norm() / tau;
        let c = 1.0 / theta.hypot(1.0);
        tau *= theta * c;
        eta = c * c * alpha;
        z.axpy(eta, &d, 1.0);

        #[allow(clippy::cast_precision_loss)]
        let bound = tau * ((step + 2) as f64).sqrt();
        if bound / b_norm <= limits.tolerance {
            update_x(x, &z);
            let achieved = relative_residual(a, b, x);
            if achieved <= limits.tolerance {
                return outcome(Method::Tfqmr, iter, achieved, limits.tolerance);
            }
        }

        if even {
            u.axpy(-alpha, &v, 1.0);
            bu = apply_b(&u);
        } else {
            let rho_next = shadow.dot(&w);
            if rho_next == 0.0 || !rho_next.is_finite() {
                return Err(breakdown(iter));
            }
            let beta = rho_next / rho;
            rho = rho_next;

            // u = w + β u, v = B u + β (B u_prev + β v)
            u.axpy(1.0, &w, beta);
            v.axpy(1.0, &bu, beta);
            bu = apply_b(&u);
            v.axpy(1.0, &bu, beta);
        }
    }

    update_x(x, &z);
    let achieved = relative_residual(a, b, x);
    outcome(Method::Tfqmr, limits.max_iters, achieved, limits.tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use newtonkit_core::{Identity, Jacobian};

    #[test]
    fn solves_small_nonsymmetric_system() {
        let dense = DMatrix::from_row_slice(3, 3, &[3.0, -1.0, 0.5, 1.0, 4.0, -1.0, 0.0, 2.0, 5.0]);
        let a = Jacobian::from_dense(&dense).unwrap();
        let b = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let mut x = DVector::zeros(3);
        let limits = Limits {
            max_iters: 100,
            tolerance: 1e-12,
        };

        let result = solve(&a, &Identity, &b, &mut x, limits).unwrap();

        assert!(result.converged);
        let expected = dense.lu().solve(&b).unwrap();
        assert_relative_eq!(x, expected, epsilon = 1e-10);
    }
}
