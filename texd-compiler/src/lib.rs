//! Compile job execution for the texd service.
//!
//! Creates an isolated sandbox per job, runs the external typesetting
//! engine against it with a hard timeout, locates the produced artifact,
//! and removes the sandbox on every exit path.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod config;
pub mod error;
pub mod locator;
pub mod output;
pub mod process;
pub mod runner;
pub mod sandbox;

pub use backend::{CompileOutput, CompilerBackend, Invocation};
pub use config::{CompilerConfig, DEFAULT_TIMEOUT};
pub use error::CompilerError;
pub use locator::find_artifact;
pub use output::{clip_tail, CapturedPipe, MAX_DIAGNOSTIC_BYTES, PIPE_CAPTURE_LIMIT};
pub use process::{engine_args, ProcessBackend};
pub use runner::{compute_hash, CompileRunner, CompiledArtifact};
pub use sandbox::{remove_job_dir, JobSandbox, OUTPUT_DIR};
