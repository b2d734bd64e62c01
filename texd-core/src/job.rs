use std::fmt;

use crate::error::CoreError;

/// Lifecycle of a single compile job.
///
/// ```text
/// received → validated → sandboxed → compiling → {compiled | compile-failed}
///   → {artifact-found | artifact-missing} → responded → cleaned-up
/// ```
///
/// `Responded` means the outcome (artifact bytes or error) has been fully
/// materialised and handed to the response emitter. Every path ends in
/// `CleanedUp`; failures before compilation may jump to `Responded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum JobState {
    Received,
    Validated,
    Sandboxed,
    Compiling,
    Compiled,
    CompileFailed,
    ArtifactFound,
    ArtifactMissing,
    Responded,
    CleanedUp,
}

impl JobState {
    /// Return `true` if `next` is a legal successor of `self`.
    #[must_use]
    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::{
            ArtifactFound, ArtifactMissing, CleanedUp, CompileFailed, Compiled, Compiling,
            Received, Responded, Sandboxed, Validated,
        };
        matches!(
            (self, next),
            (Received, Validated | Responded)
                | (Validated, Sandboxed | Responded)
                | (Sandboxed, Compiling | Responded)
                | (Compiling, Compiled | CompileFailed)
                | (Compiled, ArtifactFound | ArtifactMissing | Responded)
                | (CompileFailed | ArtifactFound | ArtifactMissing, Responded)
                | (Responded, CleanedUp)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTransition`] for an illegal move.
    pub fn advance(self, next: JobState) -> Result<JobState, CoreError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidTransition { from: self, to: next })
        }
    }

    /// Return `true` once nothing further can happen to the job.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == JobState::CleanedUp
    }

    /// Kebab-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Sandboxed => "sandboxed",
            Self::Compiling => "compiling",
            Self::Compiled => "compiled",
            Self::CompileFailed => "compile-failed",
            Self::ArtifactFound => "artifact-found",
            Self::ArtifactMissing => "artifact-missing",
            Self::Responded => "responded",
            Self::CleanedUp => "cleaned-up",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
