//! Stopping tests for the outer Newton iteration.
//!
//! A [`ConvergenceCriteria`] set combines up to four value tests with an
//! always-active iteration cap and a finite-value check:
//!
//! - **Absolute residual**: `‖F(x)‖ ≤ tol`
//! - **Relative residual**: `‖F(x)‖ ≤ tol · ‖F(x₀)‖`
//! - **Update**: `‖Δx‖ ≤ tol`
//! - **WRMS**: `sqrt(mean((Δx_i / (atol + rtol·|x_i|))²)) ≤ 1`
//!
//! Norms follow the configured [`NormType`] and [`ScaleType`]. The enabled
//! value tests are combined with a [`CombinePolicy`]; with no value test
//! enabled only the iteration cap ends the iteration.
//!
//! Checking is a pure function of the criteria and the [`Progress`] passed
//! in, so the same inputs always give the same [`TestStatus`].

mod error;
mod measurement;


pub use error::ConfigError;
pub use measurement::{Criterion, Measurement};

use nalgebra::DVector;
use newtonkit_core::{NormType, ScaleType};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the enabled value tests are combined.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CombinePolicy {
    /// Converged when any enabled test is satisfied.
    #[default]
    Any,

    /// Converged when every enabled test is satisfied.
    All,
}

/// The state of the outer iteration that the tests are evaluated on.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Completed Newton steps.
    pub iter: usize,

    /// The current iterate.
    pub x: &'a DVector<f64>,

    /// The residual at `x`.
    pub residual: &'a DVector<f64>,

    /// The residual at the initial guess.
    pub initial_residual: &'a DVector<f64>,

    /// The last accepted step, or `None` before the first step.
    pub update: Option<&'a DVector<f64>>,
}

/// Why the criteria ended the iteration without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTest {
    MaxIters,
    NonFiniteResidual,
}

/// The combined outcome of a convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Unconverged,
    Converged,
    Failed(FailureTest),
}

/// The set of stopping tests for the outer iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria {
    max_iters: usize,
    norm_type: NormType,
    scale_type: ScaleType,
    abs_residual: Option<f64>,
    rel_residual: Option<f64>,
    update: Option<f64>,
    wrms: Option<(f64, f64)>,
    policy: CombinePolicy,
}

impl Default for ConvergenceCriteria {
    /// At most 10 steps, converged when the scaled two-norm of the residual
    /// is at most `1e-6`.
    fn default() -> Self {
        Self {
            max_iters: 10,
            norm_type: NormType::Two,
            scale_type: ScaleType::Scaled,
            abs_residual: Some(1e-6),
            rel_residual: None,
            update: None,
            wrms: None,
            policy: CombinePolicy::Any,
        }
    }
}

impl ConvergenceCriteria {
    /// Sets the maximum number of Newton steps.
    ///
    /// Zero is allowed: the iteration then fails at the first check unless
    /// the initial guess already satisfies a value test.
    pub fn set_max_iters(&mut self, max_iters: usize) {
        self.max_iters = max_iters;
    }

    /// Enables the absolute residual test.
    ///
    /// # Errors
    ///
    /// Returns an error if `tol` is negative or non-finite.
    pub fn set_abs_residual(&mut self, tol: f64) -> Result<(), ConfigError> {
        self.abs_residual = Some(non_negative(tol, ConfigError::AbsResidual)?);
        Ok(())
    }

    /// Enables the relative residual test.
    ///
    /// # Errors
    ///
    /// Returns an error if `tol` is negative or non-finite.
    pub fn set_rel_residual(&mut self, tol: f64) -> Result<(), ConfigError> {
        self.rel_residual = Some(non_negative(tol, ConfigError::RelResidual)?);
        Ok(())
    }

    /// Enables the update test.
    ///
    /// # Errors
    ///
    /// Returns an error if `tol` is negative or non-finite.
    pub fn set_update(&mut self, tol: f64) -> Result<(), ConfigError> {
        self.update = Some(non_negative(tol, ConfigError::Update)?);
        Ok(())
    }

    /// Enables the weighted root-mean-square update test.
    ///
    /// # Errors
    ///
    /// Returns an error if `rtol` is negative or non-finite, or if `atol` is
    /// not positive and finite.
    pub fn set_wrms(&mut self, rtol: f64, atol: f64) -> Result<(), ConfigError> {
        let rtol = non_negative(rtol, ConfigError::WrmsRtol)?;
        if !atol.is_finite() || atol <= 0.0 {
            return Err(ConfigError::WrmsAtol);
        }
        self.wrms = Some((rtol, atol));
        Ok(())
    }

    pub fn disable_abs_residual(&mut self) {
        self.abs_residual = None;
    }

    pub fn disable_rel_residual(&mut self) {
        self.rel_residual = None;
    }

    pub fn disable_update(&mut self) {
        self.update = None;
    }

    pub fn disable_wrms(&mut self) {
        self.wrms = None;
    }

    /// Selects the norm used by the residual and update tests.
    pub fn set_norm_type(&mut self, norm_type: NormType) {
        self.norm_type = norm_type;
    }

    /// Selects whether norms are scaled by the problem size.
    pub fn set_scale_type(&mut self, scale_type: ScaleType) {
        self.scale_type = scale_type;
    }

    /// Selects how enabled tests are combined.
    pub fn set_policy(&mut self, policy: CombinePolicy) {
        self.policy = policy;
    }

    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    #[must_use]
    pub fn norm_type(&self) -> NormType {
        self.norm_type
    }

    #[must_use]
    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    /// Returns the absolute residual tolerance, if enabled.
    #[must_use]
    pub fn abs_residual(&self) -> Option<f64> {
        self.abs_residual
    }

    /// Returns the relative residual tolerance, if enabled.
    #[must_use]
    pub fn rel_residual(&self) -> Option<f64> {
        self.rel_residual
    }

    /// Returns the update tolerance, if enabled.
    #[must_use]
    pub fn update(&self) -> Option<f64> {
        self.update
    }

    /// Returns the WRMS `(rtol, atol)` pair, if enabled.
    #[must_use]
    pub fn wrms(&self) -> Option<(f64, f64)> {
        self.wrms
    }

    #[must_use]
    pub fn policy(&self) -> CombinePolicy {
        self.policy
    }

    /// Computes the configured norm of `v`.
    #[must_use]
    pub fn norm(&self, v: &DVector<f64>) -> f64 {
        self.norm_type.scaled_norm(v, self.scale_type)
    }

    /// Evaluates every enabled value test.
    ///
    /// Tests are reported in a fixed order: absolute residual, relative
    /// residual, update, WRMS.
    #[must_use]
    pub fn measure(&self, progress: &Progress<'_>) -> Vec<Measurement> {
        let residual_norm = self.norm(progress.residual);
        let mut measurements = Vec::with_capacity(4);

        if let Some(tol) = self.abs_residual {
            measurements.push(Measurement::new(
                Criterion::AbsResidual,
                Some(residual_norm),
                tol,
            ));
        }

        if let Some(tol) = self.rel_residual {
            let initial = self.norm(progress.initial_residual);
            let value = if initial == 0.0 {
                0.0
            } else {
                residual_norm / initial
            };
            measurements.push(Measurement::new(Criterion::RelResidual, Some(value), tol));
        }

        if let Some(tol) = self.update {
            let value = progress.update.map(|dx| self.norm(dx));
            measurements.push(Measurement::new(Criterion::Update, value, tol));
        }

        if let Some((rtol, atol)) = self.wrms {
            let value = progress
                .update
                .map(|dx| measurement::wrms_norm(dx, progress.x, rtol, atol));
            measurements.push(Measurement::new(Criterion::Wrms, value, 1.0));
        }

        measurements
    }

    /// Combines the enabled tests into a single status.
    ///
    /// A non-finite residual norm fails immediately. Otherwise a satisfied
    /// value test wins over the iteration cap on the same iteration.
    #[must_use]
    pub fn check(&self, progress: &Progress<'_>) -> TestStatus {
        if !self.norm(progress.residual).is_finite() {
            return TestStatus::Failed(FailureTest::NonFiniteResidual);
        }

        let measurements = self.measure(progress);
        let converged = !measurements.is_empty()
            && match self.policy {
                CombinePolicy::Any => measurements.iter().any(|m| m.satisfied),
                CombinePolicy::All => measurements.iter().all(|m| m.satisfied),
            };

        if converged {
            TestStatus::Converged
        } else if progress.iter >= self.max_iters {
            TestStatus::Failed(FailureTest::MaxIters)
        } else {
            TestStatus::Unconverged
        }
    }
}

fn non_negative(tol: f64, err: ConfigError) -> Result<f64, ConfigError> {
    if tol.is_finite() && tol >= 0.0 {
        Ok(tol)
    } else {
        Err(err)
    }
}
