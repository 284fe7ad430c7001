use crate::engine::{Report, Status};

/// Statistics from the most recent solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverStatistics {
    /// Terminal status of the solve.
    pub status: Status,

    /// Accepted Newton steps.
    pub iters: usize,

    /// Two-norm of the final residual.
    pub residual_norm: f64,

    /// Linear iterations summed over all Newton steps.
    pub linear_iters: usize,

    /// Relative residual achieved by the last linear solve.
    pub achieved_tol: f64,
}

impl From<Report> for SolverStatistics {
    fn from(report: Report) -> Self {
        Self {
            status: report.status,
            iters: report.iters,
            residual_norm: report.residual_norm,
            linear_iters: report.linear_iters,
            achieved_tol: report.achieved_tol,
        }
    }
}
