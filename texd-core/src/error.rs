use crate::job::JobState;

/// Errors produced by the `texd-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A required request field was absent, `null`, or empty.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// A request field was present but had the wrong type or shape.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The request body was not a JSON object.
    #[error("invalid request body: {reason}")]
    InvalidBody { reason: String },

    /// An engine name did not match any supported compiler.
    #[error("unknown engine '{name}': expected 'xelatex' or 'tectonic'")]
    UnknownEngine { name: String },

    /// A job attempted a state transition the lifecycle does not allow.
    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobState, to: JobState },
}
