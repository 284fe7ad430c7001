use nalgebra::DVector;
use newtonkit_core::{ApplyPreconditioner, Jacobian, Preconditioner, PreconditionerError};

/// Diagonal (Jacobi) preconditioner, `M = diag(J)`.
///
/// Acts as the identity until it has been computed.
#[derive(Debug, Clone, Default)]
pub struct Jacobi {
    inverse_diagonal: DVector<f64>,
}

impl ApplyPreconditioner for Jacobi {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        if self.inverse_diagonal.len() == r.len() {
            z.copy_from(&r.component_mul(&self.inverse_diagonal));
        } else {
            z.copy_from(r);
        }
    }
}

impl Preconditioner for Jacobi {
    fn compute(
        &mut self,
        _x: &DVector<f64>,
        jacobian: &Jacobian,
    ) -> Result<(), PreconditionerError> {
        let diagonal = jacobian.diagonal();
        if let Some(row) = diagonal.iter().position(|d| *d == 0.0 || !d.is_finite()) {
            return Err(PreconditionerError::ZeroPivot { row });
        }
        self.inverse_diagonal = diagonal.map(f64::recip);
        Ok(())
    }
}
