//! Error types for mobix.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MobilityError {
    /// The requested boundary geometry is not supported by the chosen
    /// solver, or a periodicity token was not recognized. Raised at
    /// construction; the attempt is fatal and not retried.
    #[error("configuration error in {solver}: {reason}")]
    Config {
        /// Solver that rejected the configuration.
        solver: &'static str,
        /// Which geometry was requested and why it was rejected.
        reason: String,
    },

    /// A parameter failed validation during `initialize`.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The solver lifecycle was violated (e.g. computing before
    /// `initialize`, or `initialize` twice without `clean`).
    #[error("usage error: {0}")]
    Usage(String),

    /// The external accelerated engine failed during setup or compute.
    /// After this error `clean` remains safe to call.
    #[error("engine failure: {0}")]
    Engine(String),
}

impl MobilityError {
    /// Configuration error naming the rejecting solver.
    pub fn config(solver: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            solver,
            reason: reason.into(),
        }
    }

    /// Parameter validation error.
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters(reason.into())
    }

    /// Lifecycle/usage error.
    pub fn usage(reason: impl Into<String>) -> Self {
        Self::Usage(reason.into())
    }

    /// Opaque backend failure.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, MobilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MobilityError::config("SelfMobility", "open boundaries only");
        assert!(err.to_string().contains("SelfMobility"));
        assert!(err.to_string().contains("open boundaries only"));
    }

    #[test]
    fn test_usage_display() {
        let err = MobilityError::usage("mdot called before initialize");
        assert!(err.to_string().contains("usage error"));
    }
}
