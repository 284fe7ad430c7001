//! Inner linear solvers for the Newton step `J Δx = -F`.
//!
//! Each Newton step solves a linear system with the current Jacobian. The
//! Krylov methods only need matrix-vector products and a preconditioner
//! application, so they work on any [`LinearOperator`]. The direct method
//! factors the Jacobian itself.
//!
//! # Methods
//!
//! - [`Method::Gmres`]: restarted GMRES with right preconditioning
//! - [`Method::Cg`]: preconditioned conjugate gradient (SPD systems)
//! - [`Method::Cgs`]: conjugate gradient squared
//! - [`Method::Tfqmr`]: transpose-free quasi-minimal residual
//! - [`Method::BiCgStab`]: stabilized bi-conjugate gradient
//! - [`Method::Lu`]: dense LU factorization of the Jacobian
//!
//! All iterative methods stop when `‖b - A x‖ / ‖b‖ ≤ tolerance` or when the
//! iteration cap is reached. Reaching the cap is not an error: the returned
//! [`LinearSolve`] reports `converged = false` and the caller decides whether
//! the approximate solution is good enough.

mod bicgstab;
mod cg;
mod cgs;
mod config;
mod error;
mod gmres;
mod lu;
mod tfqmr;

pub use config::{ConfigError, LinearSolverConfig, Method};
pub use error::LinearError;

use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, Jacobian, LinearOperator};

/// The outcome of one linear solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSolve {
    /// Iterations performed (one for a direct solve).
    pub iters: usize,

    /// Achieved relative residual `‖b - A x‖ / ‖b‖`.
    pub achieved_tol: f64,

    /// Whether the achieved residual meets the configured tolerance.
    pub converged: bool,
}

/// Iteration limits shared by the Krylov methods.
#[derive(Debug, Clone, Copy)]
struct Limits {
    max_iters: usize,
    tolerance: f64,
}

/// Solves `J x = b` with the configured method.
///
/// On entry `x` holds the initial guess; on return it holds the solution.
///
/// # Errors
///
/// Returns an error if the dimensions do not match, the method breaks down,
/// or the factorization finds the matrix singular.
pub fn solve<M>(
    config: &LinearSolverConfig,
    jacobian: &Jacobian,
    preconditioner: &M,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
) -> Result<LinearSolve, LinearError>
where
    M: ApplyPreconditioner + ?Sized,
{
    let n = jacobian.dim();
    for len in [b.len(), x.len()] {
        if len != n {
            return Err(LinearError::DimensionMismatch {
                expected: n,
                actual: len,
            });
        }
    }

    let b_norm = b.norm();
    if !b_norm.is_finite() {
        return Err(LinearError::NonFinite {
            method: config.method(),
        });
    }
    if b_norm == 0.0 {
        x.fill(0.0);
        return Ok(LinearSolve {
            iters: 0,
            achieved_tol: 0.0,
            converged: true,
        });
    }

    let limits = Limits {
        max_iters: config.max_iters(),
        tolerance: config.tolerance(),
    };

    match config.method() {
        Method::Gmres => gmres::solve(
            jacobian,
            preconditioner,
            b,
            x,
            limits,
            config.krylov_subspace_size(),
        ),
        Method::Cg => cg::solve(jacobian, preconditioner, b, x, limits),
        Method::Cgs => cgs::solve(jacobian, preconditioner, b, x, limits),
        Method::Tfqmr => tfqmr::solve(jacobian, preconditioner, b, x, limits),
        Method::BiCgStab => bicgstab::solve(jacobian, preconditioner, b, x, limits),
        Method::Lu => lu::solve(jacobian, b, x, limits.tolerance),
    }
}

/// Builds the result of a finished solve from its true relative residual.
fn outcome(
    method: Method,
    iters: usize,
    achieved_tol: f64,
    tolerance: f64,
) -> Result<LinearSolve, LinearError> {
    if !achieved_tol.is_finite() {
        return Err(LinearError::NonFinite { method });
    }
    Ok(LinearSolve {
        iters,
        achieved_tol,
        converged: achieved_tol <= tolerance,
    })
}

/// Computes `b - A x`.
fn residual<A>(a: &A, b: &DVector<f64>, x: &DVector<f64>) -> DVector<f64>
where
    A: LinearOperator + ?Sized,
{
    let mut ax = DVector::zeros(b.len());
    a.apply(x, &mut ax);
    b - ax
}

/// Computes `‖b - A x‖ / ‖b‖` for a nonzero `b`.
fn relative_residual<A>(a: &A, b: &DVector<f64>, x: &DVector<f64>) -> f64
where
    A: LinearOperator + ?Sized,
{
    residual(a, b, x).norm() / b.norm()
}

/// Computes `A x` into a new vector.
fn product<A>(a: &A, x: &DVector<f64>) -> DVector<f64>
where
    A: LinearOperator + ?Sized,
{
    let mut y = DVector::zeros(x.len());
    a.apply(x, &mut y);
    y
}

/// Computes `M⁻¹ r` into a new vector.
fn precondition<M>(m: &M, r: &DVector<f64>) -> DVector<f64>
where
    M: ApplyPreconditioner + ?Sized,
{
    let mut z = DVector::zeros(r.len());
    m.apply(r, &mut z);
    z
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use newtonkit_core::Identity;

    /// Symmetric positive definite tridiagonal matrix `tridiag(-1, 4, -1)`.
    fn spd(n: usize) -> Jacobian {
        let dense = DMatrix::from_fn(n, n, |i, j| match i.abs_diff(j) {
            0 => 4.0,
            1 => -1.0,
            _ => 0.0,
        });
        Jacobian::from_dense(&dense).unwrap()
    }

    /// Nonsymmetric, diagonally dominant matrix.
    fn nonsymmetric(n: usize) -> Jacobian {
        let dense = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                5.0
            } else if j == i + 1 {
                -2.0
            } else if i == j + 1 {
                1.0
            } else if j == i + 3 {
                0.5
            } else {
                0.0
            }
        });
        Jacobian::from_dense(&dense).unwrap()
    }

    fn rhs(n: usize) -> DVector<f64> {
        DVector::from_fn(n, |i, _| 1.0 + f64::from(u32::try_from(i).unwrap()).sin())
    }

    fn config(method: Method) -> LinearSolverConfig {
        LinearSolverConfig::new(method, 200, 1e-10).unwrap()
    }

    #[test]
    fn every_method_solves_spd_system() {
        let a = spd(12);
        let b = rhs(12);

        for method in [
            Method::Gmres,
            Method::Cg,
            Method::Cgs,
            Method::Tfqmr,
            Method::BiCgStab,
            Method::Lu,
        ] {
            let mut x = DVector::zeros(12);
            let result = solve(&config(method), &a, &Identity, &b, &mut x)
                .unwrap_or_else(|e| panic!("{method} failed: {e}"));

            assert!(result.converged, "{method} did not converge");
            assert!(result.achieved_tol <= 1e-10, "{method}: {}", result.achieved_tol);
            assert!(relative_residual(&a, &b, &x) <= 1e-9, "{method} residual too large");
        }
    }

    #[test]
    fn nonsymmetric_methods_solve_nonsymmetric_system() {
        let a = nonsymmetric(15);
        let b = rhs(15);

        for method in [
            Method::Gmres,
            Method::Cgs,
            Method::Tfqmr,
            Method::BiCgStab,
            Method::Lu,
        ] {
            let mut x = DVector::zeros(15);
            let result = solve(&config(method), &a, &Identity, &b, &mut x)
                .unwrap_or_else(|e| panic!("{method} failed: {e}"));

            assert!(result.converged, "{method} did not converge");
            assert!(relative_residual(&a, &b, &x) <= 1e-9, "{method} residual too large");
        }
    }

    #[test]
    fn zero_rhs_returns_zero_without_iterating() {
        let a = spd(4);
        let b = DVector::zeros(4);
        let mut x = DVector::from_element(4, 3.0);

        let result = solve(&config(Method::Gmres), &a, &Identity, &b, &mut x).unwrap();

        assert_eq!(result.iters, 0);
        assert!(result.converged);
        assert_relative_eq!(x.norm(), 0.0);
    }

    #[test]
    fn dimension_mismatch_errors() {
        let a = spd(4);
        let b = DVector::from_element(3, 1.0);
        let mut x = DVector::zeros(4);

        let result = solve(&config(Method::Cg), &a, &Identity, &b, &mut x);

        assert_eq!(
            result,
            Err(LinearError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn iteration_cap_reports_unconverged() {
        let a = nonsymmetric(30);
        let b = rhs(30);
        let mut x = DVector::zeros(30);
        let config = LinearSolverConfig::new(Method::Gmres, 2, 1e-14).unwrap();

        let result = solve(&config, &a, &Identity, &b, &mut x).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iters, 2);
        assert!(result.achieved_tol < 1.0);
    }

    #[test]
    fn non_finite_rhs_errors() {
        let a = spd(2);
        let b = DVector::from_vec(vec![1.0, f64::NAN]);
        let mut x = DVector::zeros(2);

        let result = solve(&config(Method::BiCgStab), &a, &Identity, &b, &mut x);

        assert_eq!(
            result,
            Err(LinearError::NonFinite {
                method: Method::BiCgStab
            })
        );
    }
}
