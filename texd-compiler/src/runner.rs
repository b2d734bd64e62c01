//! Compile job runner: sandbox, compile, locate, read, clean up.
//!
//! The runner owns the per-job lifecycle. It reads the artifact fully into
//! memory before removing the sandbox, so deletion can never race the read,
//! and it removes the sandbox on every path before returning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use texd_core::{CompileRequest, ContentHash, Engine, JobId, JobState};

use crate::backend::CompileOutput;
use crate::locator::find_artifact;
use crate::output::clip_tail;
use crate::sandbox::JobSandbox;
use crate::{CompilerBackend, CompilerConfig, CompilerError, ProcessBackend};

/// Bytes of a successful run's stderr kept in the debug log.
const STDERR_LOG_BYTES: usize = 1024;

/// A compiled document ready to be sent to the caller.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CompiledArtifact {
    /// Job that produced the artifact.
    pub job_id: JobId,
    /// Sanitized download name, e.g. `cv.pdf`.
    pub file_name: String,
    /// The artifact bytes.
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`.
    pub content_hash: ContentHash,
    /// Wall-clock time from sandbox creation to artifact read.
    pub duration: Duration,
}

/// Runs compile jobs against a [`CompilerBackend`].
///
/// Jobs share nothing but the file system, and each job's footprint is
/// namespaced by its sandbox directory, so `execute` may be called
/// concurrently without coordination.
///
/// # Cancel Safety
/// Cancel safe. Dropping the future kills the compiler via `kill_on_drop`
/// and removes the sandbox via its `Drop`.
pub struct CompileRunner {
    backend: Arc<dyn CompilerBackend>,
    config: CompilerConfig,
}

impl CompileRunner {
    /// Create a runner with an explicit backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CompilerBackend>, config: CompilerConfig) -> Self {
        Self { backend, config }
    }

    /// Create a runner that spawns the compiler described by `config`.
    #[must_use]
    pub fn from_config(config: CompilerConfig) -> Self {
        let backend = Arc::new(ProcessBackend::from_config(&config));
        Self::new(backend, config)
    }

    #[must_use]
    pub fn engine(&self) -> Engine {
        self.config.engine
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Check that the backend can run.
    ///
    /// # Errors
    /// Propagates errors from [`CompilerBackend::health_check`].
    pub async fn health_check(&self) -> Result<(), CompilerError> {
        self.backend.health_check().await
    }

    /// Compile `request` in a fresh sandbox and return the artifact.
    ///
    /// # Errors
    /// - [`CompilerError::Sandbox`] if the sandbox cannot be prepared or the
    ///   artifact cannot be read.
    /// - [`CompilerError::SpawnFailed`], [`CompilerError::Failed`] or
    ///   [`CompilerError::TimedOut`] from the backend.
    /// - [`CompilerError::ArtifactMissing`] if the compiler succeeded but
    ///   left no artifact.
    pub async fn execute(&self, request: &CompileRequest) -> Result<CompiledArtifact, CompilerError> {
        let started = Instant::now();
        let mut trace = JobTrace::new();
        trace.advance(JobState::Validated);

        let mut sandbox =
            match JobSandbox::create(&self.config.tmp_root, self.config.engine, &request.base_name).await {
                Ok(sandbox) => sandbox,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create sandbox");
                    trace.advance(JobState::Responded);
                    trace.advance(JobState::CleanedUp);
                    return Err(e);
                }
            };
        trace.job_id = Some(sandbox.id());

        let result = self.run_in(&sandbox, request, started, &mut trace).await;
        trace.advance(JobState::Responded);

        sandbox.cleanup().await;
        trace.advance(JobState::CleanedUp);

        match &result {
            Ok(artifact) => tracing::info!(
                job_id = %artifact.job_id,
                engine = %self.config.engine,
                bytes = artifact.bytes.len(),
                sha256 = %artifact.content_hash,
                elapsed_ms = artifact.duration.as_millis(),
                "compile job succeeded"
            ),
            Err(e) => tracing::warn!(
                job_id = %sandbox.id(),
                engine = %self.config.engine,
                elapsed_ms = started.elapsed().as_millis(),
                error = %e,
                "compile job failed"
            ),
        }

        result
    }

    async fn run_in(
        &self,
        sandbox: &JobSandbox,
        request: &CompileRequest,
        started: Instant,
        trace: &mut JobTrace,
    ) -> Result<CompiledArtifact, CompilerError> {
        sandbox.stage_source(&request.source).await?;
        sandbox.stage_assets(&self.config.assets).await;
        trace.advance(JobState::Sandboxed);

        trace.advance(JobState::Compiling);
        let output = match self.backend.compile(&sandbox.invocation(), self.config.timeout).await {
            Ok(output) => output,
            Err(e) => {
                trace.advance(JobState::CompileFailed);
                return Err(e);
            }
        };
        trace.advance(JobState::Compiled);
        log_compiler_warnings(sandbox.id(), &output);

        let extension = self.config.engine.artifact_extension();
        let Some(path) = find_artifact(sandbox.output_dir(), extension).await? else {
            trace.advance(JobState::ArtifactMissing);
            return Err(CompilerError::ArtifactMissing { dir: sandbox.output_dir().to_owned() });
        };
        trace.advance(JobState::ArtifactFound);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CompilerError::sandbox(&path, e))?;

        Ok(CompiledArtifact {
            job_id: sandbox.id(),
            file_name: request.base_name.with_extension(extension),
            content_hash: compute_hash(&bytes),
            bytes,
            duration: started.elapsed(),
        })
    }
}

/// Engines may print warnings on stderr and still exit 0.
fn log_compiler_warnings(job_id: JobId, output: &CompileOutput) {
    if let Some(stderr) = warning_excerpt(output) {
        tracing::debug!(%job_id, %stderr, "compiler wrote to stderr");
    }
}

fn warning_excerpt(output: &CompileOutput) -> Option<String> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    (!stderr.is_empty()).then(|| clip_tail(stderr, STDERR_LOG_BYTES))
}

/// Tracks a job's [`JobState`] and logs each transition.
struct JobTrace {
    job_id: Option<JobId>,
    state: JobState,
}

impl JobTrace {
    fn new() -> Self {
        Self { job_id: None, state: JobState::Received }
    }

    fn advance(&mut self, next: JobState) {
        match self.state.advance(next) {
            Ok(state) => {
                self.state = state;
                match self.job_id {
                    Some(job_id) => tracing::debug!(%job_id, %state, "job state"),
                    None => tracing::debug!(%state, "job state"),
                }
            }
            Err(e) => tracing::error!(job_id = ?self.job_id.map(|id| id.to_string()), error = %e, "job lifecycle violated"),
        }
    }
}

/// Compute the SHA-256 digest of an artifact.
///
/// # Complexity
/// O(n) in the artifact length.
#[must_use]
pub fn compute_hash(bytes: &[u8]) -> ContentHash {
    let digest = Sha256::digest(bytes);
    ContentHash::new(digest.into())
}
