//! Core types for the texd LaTeX compilation service.
//!
//! Defines the domain types shared by the compiler and gateway crates:
//! job identifiers, the engine selection, validated compile requests and
//! the per-job lifecycle.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod engine;
pub mod error;
pub mod id;
pub mod job;
pub mod request;

pub use engine::Engine;
pub use error::CoreError;
pub use id::{ContentHash, JobId, JOB_ID_BYTES};
pub use job::JobState;
pub use request::{
    BaseName, CompileRequest, DEFAULT_BASE_NAME, FILENAME_FIELD, MAX_BASE_NAME_LEN, SOURCE_FIELD,
};
