use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CsrMatrix, convert::serial::convert_csr_dense, pattern::SparsityPattern};
use thiserror::Error;

use crate::LinearOperator;

/// Errors that can occur when building a sparsity pattern or assembling
/// entries into a [`Jacobian`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("jacobian must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("entry ({row}, {col}) is outside a {dim}x{dim} jacobian")]
    OutOfBounds { row: usize, col: usize, dim: usize },

    #[error("entry ({row}, {col}) is not in the sparsity pattern")]
    NotInPattern { row: usize, col: usize },
}

/// Returns a pattern in which every entry of an `n x n` matrix is stored.
#[must_use]
pub fn dense_pattern(n: usize) -> SparsityPattern {
    let offsets = (0..=n).map(|row| row * n).collect();
    let indices = (0..n).flat_map(|_| 0..n).collect();

    // Offsets and indices are sorted and in bounds by construction.
    SparsityPattern::try_from_offsets_and_indices(n, n, offsets, indices).unwrap()
}

/// Builds an `n x n` pattern from `(row, col)` entries.
///
/// Duplicate entries are merged and entries may be given in any order.
///
/// # Errors
///
/// Returns [`PatternError::OutOfBounds`] if an entry lies outside the matrix.
pub fn pattern_from_entries<I>(n: usize, entries: I) -> Result<SparsityPattern, PatternError>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut rows = vec![Vec::new(); n];
    for (row, col) in entries {
        if row >= n || col >= n {
            return Err(PatternError::OutOfBounds { row, col, dim: n });
        }
        rows[row].push(col);
    }

    let mut offsets = Vec::with_capacity(n + 1);
    let mut indices = Vec::new();
    offsets.push(0);
    for mut cols in rows {
        cols.sort_unstable();
        cols.dedup();
        indices.extend(cols);
        offsets.push(indices.len());
    }

    // Rows are sorted, deduplicated, and bounds-checked above.
    Ok(SparsityPattern::try_from_offsets_and_indices(n, n, offsets, indices).unwrap())
}

/// A square sparse Jacobian in CSR format.
///
/// The sparsity pattern is fixed when the Jacobian is created. Assembly
/// overwrites the stored values in place, so the same storage can be refilled
/// at every Newton step without reallocating.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    matrix: CsrMatrix<f64>,
}

impl Jacobian {
    /// Creates a zero-valued Jacobian with the given sparsity pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::NotSquare`] if the pattern is not square.
    pub fn new(pattern: SparsityPattern) -> Result<Self, PatternError> {
        let (rows, cols) = (pattern.major_dim(), pattern.minor_dim());
        if rows != cols {
            return Err(PatternError::NotSquare { rows, cols });
        }

        let values = vec![0.0; pattern.nnz()];
        // Values length matches the pattern by construction.
        let matrix = CsrMatrix::try_from_pattern_and_values(pattern, values).unwrap();
        Ok(Self { matrix })
    }

    /// Creates a Jacobian from a dense matrix, storing every entry.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::NotSquare`] if the matrix is not square.
    pub fn from_dense(dense: &DMatrix<f64>) -> Result<Self, PatternError> {
        if dense.nrows() != dense.ncols() {
            return Err(PatternError::NotSquare {
                rows: dense.nrows(),
                cols: dense.ncols(),
            });
        }

        let n = dense.nrows();
        let mut jacobian = Self::new(dense_pattern(n))?;
        for row in 0..n {
            for col in 0..n {
                jacobian.set(row, col, dense[(row, col)])?;
            }
        }
        Ok(jacobian)
    }

    /// Returns the number of rows (and columns).
    #[must_use]
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Returns the underlying CSR matrix.
    #[must_use]
    pub fn as_csr(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    /// Zeroes every stored value, keeping the pattern.
    pub fn clear(&mut self) {
        self.matrix.values_mut().fill(0.0);
    }

    /// Overwrites the entry at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is out of bounds or not in the pattern.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), PatternError> {
        let index = self.position(row, col)?;
        self.matrix.values_mut()[index] = value;
        Ok(())
    }

    /// Adds `value` to the entry at `(row, col)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is out of bounds or not in the pattern.
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Result<(), PatternError> {
        let index = self.position(row, col)?;
        self.matrix.values_mut()[index] += value;
        Ok(())
    }

    /// Returns the value at `(row, col)`, or zero if it is not stored.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.position(row, col)
            .map_or(0.0, |index| self.matrix.values()[index])
    }

    /// Returns the matrix diagonal.
    #[must_use]
    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_fn(self.dim(), |i, _| self.get(i, i))
    }

    /// Converts to a dense matrix.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        convert_csr_dense(&self.matrix)
    }

    /// Finds the storage index of `(row, col)`.
    fn position(&self, row: usize, col: usize) -> Result<usize, PatternError> {
        let dim = self.dim();
        if row >= dim || col >= dim {
            return Err(PatternError::OutOfBounds { row, col, dim });
        }

        let (offsets, indices, _) = self.matrix.csr_data();
        let start = offsets[row];
        let cols = &indices[start..offsets[row + 1]];
        cols.binary_search(&col)
            .map(|found| start + found)
            .map_err(|_| PatternError::NotInPattern { row, col })
    }
}

impl LinearOperator for Jacobian {
    fn dim(&self) -> usize {
        Jacobian::dim(self)
    }

    fn apply(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        let (offsets, indices, values) = self.matrix.csr_data();
        for (row, yi) in y.iter_mut().enumerate() {
            let range = offsets[row]..offsets[row + 1];
            *yi = indices[range.clone()]
                .iter()
                .zip(&values[range])
                .map(|(&col, &value)| value * x[col])
                .sum();
        }
    }
}
