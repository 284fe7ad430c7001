use std::fmt;

use nalgebra::DVector;

/// A single value test in a [`ConvergenceCriteria`](super::ConvergenceCriteria) set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// `‖F‖ ≤ tol`
    AbsResidual,

    /// `‖F‖ ≤ tol · ‖F₀‖`
    RelResidual,

    /// `‖Δx‖ ≤ tol`
    Update,

    /// Weighted root-mean-square of the update `≤ 1`.
    Wrms,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AbsResidual => "absolute residual",
            Self::RelResidual => "relative residual",
            Self::Update => "update",
            Self::Wrms => "WRMS",
        })
    }
}

/// The result of evaluating one enabled test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub criterion: Criterion,

    /// The measured value, or `None` if the test cannot be measured yet.
    pub value: Option<f64>,

    /// The bound the value is compared against.
    pub tolerance: f64,

    pub satisfied: bool,
}

impl Measurement {
    pub(super) fn new(criterion: Criterion, value: Option<f64>, tolerance: f64) -> Self {
        Self {
            criterion,
            value,
            tolerance,
            satisfied: value.is_some_and(|v| v <= tolerance),
        }
    }
}

/// Weighted root-mean-square norm of `dx` with weights `atol + rtol·|x_i|`.
pub(super) fn wrms_norm(dx: &DVector<f64>, x: &DVector<f64>, rtol: f64, atol: f64) -> f64 {
    if dx.is_empty() {
        return 0.0;
    }

    let sum: f64 = dx
        .iter()
        .zip(x.iter())
        .map(|(d, xi)| {
            let weight = atol + rtol * xi.abs();
            (d / weight).powi(2)
        })
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let n = dx.len() as f64;
    (sum / n).sqrt()
}
