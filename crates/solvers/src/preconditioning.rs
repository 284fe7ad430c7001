//! Preconditioner selection for the inner linear solves.
//!
//! A solver either runs unpreconditioned, builds one of the built-in
//! preconditioners from each Newton step's Jacobian, or uses a preconditioner
//! shared with the caller through a [`SharedPreconditioner`] handle.

mod ilu0;
mod jacobi;

pub use ilu0::Ilu0;
pub use jacobi::Jacobi;

use std::{fmt, str::FromStr, sync::MutexGuard};

use nalgebra::DVector;
use newtonkit_core::{
    ApplyPreconditioner, Jacobian, Preconditioner, PreconditionerError, SharedPreconditioner,
};
use thiserror::Error;

/// A preconditioner name that is not recognized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown preconditioner: {0:?}")]
pub struct UnknownPreconditioner(pub String);

/// The preconditioners that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinPreconditioner {
    /// Inverse of the Jacobian diagonal.
    Jacobi,

    /// Incomplete LU with zero fill-in.
    Ilu0,
}

impl BuiltinPreconditioner {
    /// Creates an uncomputed instance.
    #[must_use]
    pub fn build(self) -> Builtin {
        match self {
            Self::Jacobi => Builtin::Jacobi(Jacobi::default()),
            Self::Ilu0 => Builtin::Ilu0(Ilu0::default()),
        }
    }
}

impl FromStr for BuiltinPreconditioner {
    type Err = UnknownPreconditioner;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jacobi" => Ok(Self::Jacobi),
            "ilu" | "ilu0" => Ok(Self::Ilu0),
            _ => Err(UnknownPreconditioner(name.to_owned())),
        }
    }
}

/// A computed or computable built-in preconditioner.
#[derive(Debug, Clone)]
pub enum Builtin {
    Jacobi(Jacobi),
    Ilu0(Ilu0),
}

impl ApplyPreconditioner for Builtin {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        match self {
            Self::Jacobi(p) => p.apply(r, z),
            Self::Ilu0(p) => p.apply(r, z),
        }
    }
}

impl Preconditioner for Builtin {
    fn compute(
        &mut self,
        x: &DVector<f64>,
        jacobian: &Jacobian,
    ) -> Result<(), PreconditionerError> {
        match self {
            Self::Jacobi(p) => p.compute(x, jacobian),
            Self::Ilu0(p) => p.compute(x, jacobian),
        }
    }
}

/// Where a solver gets its preconditioner from.
#[derive(Clone, Default)]
pub enum PreconditionerPort {
    /// No preconditioning.
    #[default]
    None,

    /// A built-in preconditioner owned by the solver.
    Builtin(BuiltinPreconditioner),

    /// A preconditioner shared with the caller.
    Shared(SharedPreconditioner),
}

impl PreconditionerPort {
    /// Selects a port by name: `"None"` or a built-in preconditioner name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not recognized.
    pub fn from_name(name: &str) -> Result<Self, UnknownPreconditioner> {
        if name.trim().eq_ignore_ascii_case("none") {
            Ok(Self::None)
        } else {
            name.parse().map(Self::Builtin)
        }
    }

    /// Returns true if no preconditioner is attached.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for PreconditionerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            Self::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

/// The preconditioner applied during one linear solve.
///
/// A shared preconditioner stays locked for as long as this value lives.
pub enum ActivePreconditioner<'a> {
    Identity,
    Builtin(&'a Builtin),
    Shared(MutexGuard<'a, dyn Preconditioner + Send + 'static>),
}

impl ApplyPreconditioner for ActivePreconditioner<'_> {
    fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        match self {
            Self::Identity => z.copy_from(r),
            Self::Builtin(p) => p.apply(r, z),
            Self::Shared(guard) => guard.apply(r, z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use newtonkit_core::shared;

    #[test]
    fn parses_builtin_names_ignoring_case() {
        assert_eq!(
            "jacobi".parse::<BuiltinPreconditioner>(),
            Ok(BuiltinPreconditioner::Jacobi)
        );
        assert_eq!(
            "ILU".parse::<BuiltinPreconditioner>(),
            Ok(BuiltinPreconditioner::Ilu0)
        );
        assert_eq!(
            "Ilu0".parse::<BuiltinPreconditioner>(),
            Ok(BuiltinPreconditioner::Ilu0)
        );
        assert_eq!(
            "AMG".parse::<BuiltinPreconditioner>(),
            Err(UnknownPreconditioner("AMG".to_owned()))
        );
    }

    #[test]
    fn none_name_clears_the_port() {
        assert!(PreconditionerPort::from_name("None").unwrap().is_none());
        assert!(matches!(
            PreconditionerPort::from_name("Jacobi"),
            Ok(PreconditionerPort::Builtin(BuiltinPreconditioner::Jacobi))
        ));
        assert!(PreconditionerPort::from_name("multigrid").is_err());
    }

    #[test]
    fn active_shared_preconditioner_applies_through_the_lock() {
        let handle = shared(Jacobi::default());
        let active = ActivePreconditioner::Shared(handle.lock().unwrap());

        let r = DVector::from_vec(vec![1.0, 2.0]);
        let mut z = DVector::zeros(2);
        active.apply(&r, &mut z);

        assert_eq!(z, r);
        assert_eq!(
            format!("{:?}", PreconditionerPort::Shared(handle.clone())),
            "Shared(..)"
        );
    }
}
