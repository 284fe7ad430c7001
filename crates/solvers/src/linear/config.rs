use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The method used to solve each Newton step's linear system.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    /// Restarted generalized minimal residual.
    #[default]
    Gmres,

    /// Conjugate gradient (symmetric positive definite systems).
    Cg,

    /// Conjugate gradient squared.
    Cgs,

    /// Transpose-free quasi-minimal residual.
    Tfqmr,

    /// Bi-conjugate gradient with stabilization.
    BiCgStab,

    /// Direct LU factorization (single process only).
    Lu,
}

impl Method {
    /// Returns the canonical name of the method.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gmres => "GMRES",
            Self::Cg => "CG",
            Self::Cgs => "CGS",
            Self::Tfqmr => "TFQMR",
            Self::BiCgStab => "BiCGStab",
            Self::Lu => "LU",
        }
    }

    /// Returns true if the method restarts after filling its Krylov subspace.
    #[must_use]
    pub fn is_restarted(self) -> bool {
        matches!(self, Self::Gmres)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    /// Parses a method name, ignoring case.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gmres" => Ok(Self::Gmres),
            "cg" => Ok(Self::Cg),
            "cgs" => Ok(Self::Cgs),
            "tfqmr" => Ok(Self::Tfqmr),
            "bicgstab" => Ok(Self::BiCgStab),
            "lu" => Ok(Self::Lu),
            _ => Err(ConfigError::UnknownMethod(name.to_owned())),
        }
    }
}

/// Errors that can occur when validating a linear solver config.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown linear solver method: {0:?}")]
    UnknownMethod(String),

    #[error("max_iters must be positive")]
    MaxIters,

    #[error("tolerance must be finite and positive")]
    Tolerance,

    #[error("krylov subspace size must be positive for restarted methods")]
    KrylovSubspaceSize,
}

/// Configuration for the inner linear solve of each Newton step.
///
/// Every setter validates eagerly, so a config that exists is always usable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSolverConfig {
    method: Method,
    max_iters: usize,
    tolerance: f64,
    krylov_subspace_size: usize,
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(Method::Gmres, 800, 1e-8).unwrap()
    }
}

impl LinearSolverConfig {
    const DEFAULT_KRYLOV_SUBSPACE_SIZE: usize = 50;

    /// Creates a new config with the default Krylov subspace size.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero or `tolerance` is not a
    /// positive finite number.
    pub fn new(method: Method, max_iters: usize, tolerance: f64) -> Result<Self, ConfigError> {
        let config = Self {
            method,
            max_iters,
            tolerance,
            krylov_subspace_size: Self::DEFAULT_KRYLOV_SUBSPACE_SIZE,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the config with a different Krylov subspace size.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero and the method is restarted.
    pub fn with_krylov_subspace_size(mut self, size: usize) -> Result<Self, ConfigError> {
        self.set_krylov_subspace_size(size)?;
        Ok(self)
    }

    /// Selects the linear solver method.
    ///
    /// # Errors
    ///
    /// Returns an error if switching to a restarted method while the Krylov
    /// subspace size is zero.
    pub fn set_method(&mut self, method: Method) -> Result<(), ConfigError> {
        Self { method, ..*self }.validate()?;
        self.method = method;
        Ok(())
    }

    /// Selects the linear solver method by name (`"GMRES"`, `"CG"`, `"CGS"`,
    /// `"TFQMR"`, `"BiCGStab"`, or `"LU"`, ignoring case).
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not recognized.
    pub fn set_method_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.set_method(name.parse()?)
    }

    /// Sets the maximum number of linear iterations.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero.
    pub fn set_max_iters(&mut self, max_iters: usize) -> Result<(), ConfigError> {
        Self { max_iters, ..*self }.validate()?;
        self.max_iters = max_iters;
        Ok(())
    }

    /// Sets the relative residual tolerance for the linear solve.
    ///
    /// # Errors
    ///
    /// Returns an error if `tolerance` is not a positive finite number.
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), ConfigError> {
        Self { tolerance, ..*self }.validate()?;
        self.tolerance = tolerance;
        Ok(())
    }

    /// Sets the Krylov subspace size used by restarted methods.
    ///
    /// The size is ignored by methods that do not restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero and the method is restarted.
    pub fn set_krylov_subspace_size(&mut self, size: usize) -> Result<(), ConfigError> {
        Self {
            krylov_subspace_size: size,
            ..*self
        }
        .validate()?;
        self.krylov_subspace_size = size;
        Ok(())
    }

    /// Returns the selected method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the maximum number of linear iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the relative residual tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the Krylov subspace size.
    #[must_use]
    pub fn krylov_subspace_size(&self) -> usize {
        self.krylov_subspace_size
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iters == 0 {
            return Err(ConfigError::MaxIters);
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::Tolerance);
        }
        if self.method.is_restarted() && self.krylov_subspace_size == 0 {
            return Err(ConfigError::KrylovSubspaceSize);
        }
        Ok(())
    }
}
