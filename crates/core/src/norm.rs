use nalgebra::DVector;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The vector norm used by convergence tests.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormType {
    /// `‖x‖ = Σ |x_i|`
    One,

    /// `‖x‖ = sqrt(Σ x_i²)`
    #[default]
    Two,

    /// `‖x‖ = max |x_i|`
    Max,
}

/// Whether a norm is scaled by the problem size.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScaleType {
    /// Divide the two-norm by `sqrt(n)` and the other norms by `n`.
    #[default]
    Scaled,

    /// Use the raw norm.
    Unscaled,
}

impl NormType {
    /// Computes the unscaled norm of `v`.
    #[must_use]
    pub fn norm(self, v: &DVector<f64>) -> f64 {
        match self {
            Self::One => v.lp_norm(1),
            Self::Two => v.norm(),
            Self::Max => v.amax(),
        }
    }

    /// Computes the norm of `v` with the requested scaling.
    ///
    /// An empty vector has norm zero under every scaling.
    #[must_use]
    pub fn scaled_norm(self, v: &DVector<f64>, scale: ScaleType) -> f64 {
        let norm = self.norm(v);
        if scale == ScaleType::Unscaled || v.is_empty() {
            return norm;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = v.len() as f64;
        match self {
            Self::Two => norm / n.sqrt(),
            Self::One | Self::Max => norm / n,
        }
    }
}
