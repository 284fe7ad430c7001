use thiserror::Error;

/// Errors that can occur when configuring convergence criteria.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("absolute residual tolerance must be finite and non-negative")]
    AbsResidual,

    #[error("relative residual tolerance must be finite and non-negative")]
    RelResidual,

    #[error("update tolerance must be finite and non-negative")]
    Update,

    #[error("WRMS relative tolerance must be finite and non-negative")]
    WrmsRtol,

    #[error("WRMS absolute tolerance must be finite and positive")]
    WrmsAtol,
}
