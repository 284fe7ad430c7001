use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use newtonkit_core::{ApplyPreconditioner, Jacobian, Preconditioner, PreconditionerError};

/// Incomplete LU factorization with zero fill-in.
///
/// The factors share the Jacobian's sparsity pattern: `L` (unit lower, stored
/// below the diagonal) and `U` (upper, including the diagonal) are kept in a
/// single CSR matrix. Every diagonal entry must be in the pattern.
///
/// Acts as the identity until it has been computed.
#[derive(Debug, Clone, Default)]
pub struct Ilu0 {
    factors: Option<CsrMatrix<f64>>,
    diagonal: Vec<usize>,
}

impl Ilu0 {
    /// Finds the storage index of each row's diagonal entry.
    fn locate_diagonal(matrix: &CsrMatrix<f64>) -> Result<Vec<usize>, PreconditionerError> {
        let (offsets, indices, _) = matrix.csr_data();
        (0..matrix.nrows())
            .map(|row| {
                let start = offsets[row];
                indices[start..offsets[row + 1]]
                    .binary_search(&row)
                    .map(|found| start + found)
                    .map_err(|_| PreconditionerError::MissingDiagonal { row })
            })
            .collect()
    }
}

impl ApplyPreconditioner for Ilu0 {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        let Some(factors) = self.factors.as_ref().filter(|f| f.nrows() == r.len()) else {
            z.copy_from(r);
            return;
        };
        let (offsets, indices, values) = factors.csr_data();
        let n = r.len();

        // Forward solve with unit lower triangle.
        for i in 0..n {
            let mut sum = r[i];
            for k in offsets[i]..self.diagonal[i] {
                sum -= values[k] * z[indices[k]];
            }
            z[i] = sum;
        }

        // Backward solve with upper triangle.
        for i in (0..n).rev() {
            let mut sum = z[i];
            for k in (self.diagonal[i] + 1)..offsets[i + 1] {
                sum -= values[k] * z[indices[k]];
            }
            z[i] = sum / values[self.diagonal[i]];
        }
    }
}

impl Preconditioner for Ilu0 {
    fn compute(
        &mut self,
        _x: &DVector<f64>,
        jacobian: &Jacobian,
    ) -> Result<(), PreconditionerError> {
        let mut lu = jacobian.as_csr().clone();
        let diagonal = Self::locate_diagonal(&lu)?;
        let n = lu.nrows();
        let (offsets, indices, values) = lu.csr_data_mut();

        for i in 1..n {
            for ik in offsets[i]..diagonal[i] {
                let k = indices[ik];
                let pivot = values[diagonal[k]];
                if pivot == 0.0 || !pivot.is_finite() {
                    return Err(PreconditionerError::ZeroPivot { row: k });
                }
                values[ik] /= pivot;
                let factor = values[ik];

                // Update the rest of row i where row k has a matching entry.
                let row_k = &indices[diagonal[k] + 1..offsets[k + 1]];
                for ij in (ik + 1)..offsets[i + 1] {
                    if let Ok(found) = row_k.binary_search(&indices[ij]) {
                        values[ij] -= factor * values[diagonal[k] + 1 + found];
                    }
                }
            }
        }

        if let Some(row) = diagonal
            .iter()
            .position(|&d| values[d] == 0.0 || !values[d].is_finite())
        {
            return Err(PreconditionerError::ZeroPivot { row });
        }

        self.factors = Some(lu);
        self.diagonal = diagonal;
        Ok(())
    }
}
