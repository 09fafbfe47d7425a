//! Error types for the decision core

use thiserror::Error;

/// Errors raised inside the decision core.
///
/// Only [`CoreError::InvariantViolation`] aborts a planning pass. Everything
/// else is absorbed where it happens and the cycle carries on.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sensor record did not match any known message shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A landmark id with no entry in the landmark table.
    #[error("unknown landmark '{0}'")]
    UnknownReference(String),

    /// Coincident or zero-separation landmark pair.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// An inverse solve fell outside the valid control range and was clamped.
    #[error("control target unreachable: requested {requested:.3}, clamped to {clamped:.3}")]
    UnreachableControlTarget { requested: f64, clamped: f64 },

    /// A solved control value is physically impossible.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Localization or heading estimation could not pick a single answer.
    #[error("ambiguous estimate: {0}")]
    AmbiguousEstimate(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("lifecycle error in {component}: {reason}")]
    Lifecycle { component: String, reason: String },
}

impl CoreError {
    /// True when the error must abort the current planning pass.
    pub fn is_fatal_to_pass(&self) -> bool {
        matches!(self, CoreError::InvariantViolation(_))
    }
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_violations_abort_a_pass() {
        assert!(CoreError::InvariantViolation("negative power".into()).is_fatal_to_pass());
        assert!(!CoreError::MalformedInput("(foo)".into()).is_fatal_to_pass());
        assert!(!CoreError::UnreachableControlTarget {
            requested: 140.0,
            clamped: 100.0
        }
        .is_fatal_to_pass());
    }
}
