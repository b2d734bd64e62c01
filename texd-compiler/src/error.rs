//! Error types for the compiler crate.

use std::path::PathBuf;
use std::time::Duration;

use texd_core::Engine;

/// Errors that can occur while preparing, running, or collecting a compile job.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompilerError {
    /// Compiler binary not found at the configured path or on `PATH`.
    #[error("compiler binary not found at {path}")]
    BinaryNotFound { path: PathBuf },

    /// The compiler process could not be started.
    #[error("{engine} could not be started: {reason}")]
    SpawnFailed { engine: Engine, reason: String },

    /// The compiler exited with a non-zero status.
    #[error("{engine} compilation failed: {diagnostic}")]
    Failed {
        engine: Engine,
        exit_code: Option<i32>,
        diagnostic: String,
    },

    /// The compiler did not finish within the wall-clock limit and was killed.
    #[error("{engine} compilation timed out after {}s", timeout.as_secs())]
    TimedOut { engine: Engine, timeout: Duration },

    /// The compiler exited successfully but left no artifact behind.
    #[error("compiler reported success but produced no artifact in {dir}")]
    ArtifactMissing { dir: PathBuf },

    /// Sandbox preparation or artifact I/O failed.
    #[error("sandbox I/O failed at {path}: {source}")]
    Sandbox {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CompilerError {
    /// Return `true` for failures attributable to the submitted markup or the
    /// compiler run itself, as opposed to the service's own plumbing.
    #[must_use]
    pub fn is_compile_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::TimedOut { .. } | Self::SpawnFailed { .. }
        )
    }

    pub(crate) fn sandbox(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Sandbox { path: path.into(), source }
    }
}
