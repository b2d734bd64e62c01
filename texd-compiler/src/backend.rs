//! Compiler backend abstraction trait.
//!
//! Allows swapping the real subprocess invoker for an in-process fake
//! without changing the job orchestration.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use texd_core::Engine;

use crate::CompilerError;

/// Paths handed to a backend for one compile.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Invocation {
    /// Sandbox root; the compiler runs with this as its working directory.
    pub work_dir: PathBuf,
    /// The staged markup file.
    pub source_path: PathBuf,
    /// Where the compiler must write its artifact.
    pub output_dir: PathBuf,
}

impl Invocation {
    #[must_use]
    pub fn new(work_dir: PathBuf, source_path: PathBuf, output_dir: PathBuf) -> Self {
        Self { work_dir, source_path, output_dir }
    }
}

/// Output captured from a successful compiler run.
///
/// Each stream holds at most the last
/// [`PIPE_CAPTURE_LIMIT`](crate::output::PIPE_CAPTURE_LIMIT) bytes.
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Typesetting compiler abstraction.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Cancel Safety
/// [`CompilerBackend::compile`] must be cancel safe: dropping the future
/// must not leave a compiler process running.
#[async_trait]
pub trait CompilerBackend: Send + Sync {
    /// The engine whose command-line contract this backend speaks.
    fn engine(&self) -> Engine;

    /// Run the compiler once against `invocation`.
    ///
    /// Success is defined by exit status alone; whether an artifact exists
    /// is checked separately by the caller.
    ///
    /// # Errors
    /// Returns [`CompilerError::SpawnFailed`] if the process cannot start,
    /// [`CompilerError::Failed`] on non-zero exit, and
    /// [`CompilerError::TimedOut`] if `timeout` elapses first.
    async fn compile(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CompileOutput, CompilerError>;

    /// Check that the backend is available and properly configured.
    ///
    /// # Errors
    /// Returns [`CompilerError::BinaryNotFound`] if the environment is not ready.
    async fn health_check(&self) -> Result<(), CompilerError>;
}
