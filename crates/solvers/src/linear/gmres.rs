use nalgebra::{DMatrix, DVector};
use newtonkit_core::{ApplyPreconditioner, LinearOperator};

use super::{LinearError, LinearSolve, Limits, Method, outcome, precondition, product, residual};

/// Restarted GMRES with right preconditioning.
///
/// Solves `A M⁻¹ u = b` with `x = M⁻¹ u`, so the minimized residual is the
/// true residual of the original system. Each restart cycle builds an
/// orthonormal Krylov basis with modified Gram-Schmidt and reduces the
/// Hessenberg matrix with Givens rotations as it grows.
///
/// The true residual is recomputed at the start of every cycle, which is
/// where convergence and the iteration cap are judged.
pub(super) fn solve<A, M>(
    a: &A,
    m: &M,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    limits: Limits,
    restart: usize,
) -> Result<LinearSolve, LinearError>
where
    A: LinearOperator + ?Sized,
    M: ApplyPreconditioner + ?Sized,
{
    let b_norm = b.norm();
    let restart = restart.max(1);
    let mut total = 0;

    loop {
        let r = residual(a, b, x);
        let beta = r.norm();
        let rel = beta / b_norm;

        if rel <= limits.tolerance || total >= limits.max_iters || !rel.is_finite() {
            return outcome(Method::Gmres, total, rel, limits.tolerance);
        }

        let dim = restart.min(limits.max_iters - total);
        let mut basis: Vec<DVector<f64>> = Vec::with_capacity(dim + 1);
        let mut directions: Vec<DVector<f64>> = Vec::with_capacity(dim);
        let mut h = DMatrix::zeros(dim + 1, dim);
        let mut cs = vec![0.0; dim];
        let mut sn = vec![0.0; dim];
        let mut g = DVector::zeros(dim + 1);
        g[0] = beta;
        basis.push(r / beta);

        let mut k = 0;
        while k < dim {
            let z = precondition(m, &basis[k]);
            let mut w = product(a, &z);
            directions.push(z);

            for (i, v) in basis.iter().enumerate() {
                let hik = w.dot(v);
                h[(i, k)] = hik;
                w.axpy(-hik, v, 1.0);
            }
            let w_norm = w.norm();
            h[(k + 1, k)] = w_norm;

            // Apply previous rotations to the new column.
            for i in 0..k {
                let temp = cs[i] * h[(i, k)] + sn[i] * h[(i + 1, k)];
                h[(i + 1, k)] = -sn[i] * h[(i, k)] + cs[i] * h[(i + 1, k)];
                h[(i, k)] = temp;
            }

            let (c, s) = givens(h[(k, k)], h[(k + 1, k)]);
            cs[k] = c;
            sn[k] = s;
            h[(k, k)] = c * h[(k, k)] + s * h[(k + 1, k)];
            h[(k + 1, k)] = 0.0;
            g[k + 1] = -s * g[k];
            g[k] *= c;

            k += 1;
            total += 1;

            if g[k].abs() / b_norm <= limits.tolerance || w_norm == 0.0 {
                break;
            }
            basis.push(w / w_norm);
        }

        // Back-substitution for the least-squares coefficients.
        let mut y = DVector::zeros(k);
        for i in (0..k).rev() {
            let mut sum = g[i];
            for j in (i + 1)..k {
                sum -= h[(i, j)] * y[j];
            }
            if h[(i, i)] == 0.0 {
                return Err(LinearError::Breakdown {
                    method: Method::Gmres,
                    iter: total,
                });
            }
            y[i] = sum / h[(i, i)];
        }

        for (yi, z) in y.iter().zip(&directions) {
            x.axpy(*yi, z, 1.0);
        }
    }
}

/// Computes the rotation `(c, s)` that zeroes `b` in `[a, b]`.
fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else {
        let r = a.hypot(b);
        (a / r, b / r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use newtonkit_core::{Identity, Jacobian};

    use crate::linear::relative_residual;

    struct Diagonal(DVector<f64>);

    impl ApplyPreconditioner for Diagonal {
        fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
            z.copy_from(&r.component_div(&self.0));
        }
    }

    fn tridiagonal(n: usize) -> Jacobian {
        let dense = DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 4.0,
            1 => -1.0,
            _ => 0.0,
        });
        Jacobian::from_dense(&dense).unwrap()
    }

    #[test]
    fn givens_zeroes_second_component() {
        let (c, s) = givens(3.0, 4.0);
        assert_relative_eq!(c, 0.6);
        assert_relative_eq!(s, 0.8);
        assert_relative_eq!(-s * 3.0 + c * 4.0, 0.0, epsilon = 1e-15);
    }

    #[test]
    fn small_restart_still_converges() {
        let a = tridiagonal(20);
        let b = DVector::from_element(20, 1.0);
        let mut x = DVector::zeros(20);
        let limits = Limits {
            max_iters: 500,
            tolerance: 1e-10,
        };

        let result = solve(&a, &Identity, &b, &mut x, limits, 3).unwrap();

        assert!(result.converged);
        assert!(relative_residual(&a, &b, &x) <= 1e-10);
    }

    #[test]
    fn exact_preconditioner_converges_in_one_iteration() {
        let diagonal = DVector::from_fn(20, |i, _| f64::from(u32::try_from(i + 1).unwrap()));
        let a = Jacobian::from_dense(&DMatrix::from_diagonal(&diagonal)).unwrap();
        let b = DVector::from_element(20, 1.0);
        let limits = Limits {
            max_iters: 100,
            tolerance: 1e-10,
        };

        let mut x = DVector::zeros(20);
        let plain = solve(&a, &Identity, &b, &mut x, limits, 50).unwrap();

        let mut x = DVector::zeros(20);
        let preconditioned = solve(&a, &Diagonal(diagonal), &b, &mut x, limits, 50).unwrap();

        assert!(plain.converged);
        assert!(plain.iters > 1);
        assert!(preconditioned.converged);
        assert_eq!(preconditioned.iters, 1);
        assert_relative_eq!(x[4], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn starts_from_initial_guess() {
        let a = tridiagonal(6);
        let exact = DVector::from_element(6, 1.0);
        let b = product(&a, &exact);
        let mut x = exact.clone();
        let limits = Limits {
            max_iters: 10,
            tolerance: 1e-12,
        };

        let result = solve(&a, &Identity, &b, &mut x, limits, 5).unwrap();

        assert_eq!(result.iters, 0);
        assert_eq!(x, exact);
    }
}
