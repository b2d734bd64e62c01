//! Per-job sandbox directories.
//!
//! Each job owns `{tmp_root}/{engine}-{job_id}` with an `output/`
//! subdirectory. The directory is removed exactly once: by an explicit
//! [`JobSandbox::cleanup`] on normal paths, or by `Drop` if the job future
//! is cancelled or unwinds first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use texd_core::{BaseName, Engine, JobId};

use crate::backend::Invocation;
use crate::CompilerError;

/// Name of the directory the compiler writes its artifact into.
pub const OUTPUT_DIR: &str = "output";

/// An exclusive working directory for one compile job.
#[derive(Debug)]
pub struct JobSandbox {
    id: JobId,
    root: PathBuf,
    source_path: PathBuf,
    output_dir: PathBuf,
    cleaned: bool,
}

impl JobSandbox {
    /// Create the job directory and its output subdirectory.
    ///
    /// The job directory is created with `create_dir`, never
    /// `create_dir_all`, so an existing directory is an error rather than
    /// a shared one.
    ///
    /// # Errors
    /// Returns [`CompilerError::Sandbox`] if either directory cannot be created.
    pub async fn create(
        tmp_root: &Path,
        engine: Engine,
        base_name: &BaseName,
    ) -> Result<Self, CompilerError> {
        tokio::fs::create_dir_all(tmp_root)
            .await
            .map_err(|e| CompilerError::sandbox(tmp_root, e))?;

        let id = JobId::new();
        let root = tmp_root.join(format!("{}-{id}", engine.slug()));
        tokio::fs::create_dir(&root)
            .await
            .map_err(|e| CompilerError::sandbox(&root, e))?;

        // From here on, Drop owns removal of `root`.
        let sandbox = Self {
            id,
            source_path: root.join(base_name.with_extension(engine.source_extension())),
            output_dir: root.join(OUTPUT_DIR),
            root,
            cleaned: false,
        };

        tokio::fs::create_dir(&sandbox.output_dir)
            .await
            .map_err(|e| CompilerError::sandbox(&sandbox.output_dir, e))?;

        tracing::debug!(job_id = %id, dir = %sandbox.root.display(), "sandbox created");
        Ok(sandbox)
    }

    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths for the compiler backend.
    #[must_use]
    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.root.clone(), self.source_path.clone(), self.output_dir.clone())
    }

    /// Write the markup source into the sandbox.
    ///
    /// # Errors
    /// Returns [`CompilerError::Sandbox`] if the file cannot be written.
    pub async fn stage_source(&self, source: &str) -> Result<(), CompilerError> {
        tokio::fs::write(&self.source_path, source)
            .await
            .map_err(|e| CompilerError::sandbox(&self.source_path, e))
    }

    /// Copy auxiliary files into the sandbox root, keeping their file names.
    ///
    /// Staging is best-effort: a file that cannot be copied is logged and
    /// skipped, and the compile proceeds without it. Returns how many files
    /// were staged.
    pub async fn stage_assets(&self, assets: &[PathBuf]) -> usize {
        let mut staged = 0;
        for asset in assets {
            let Some(file_name) = asset.file_name() else {
                tracing::warn!(job_id = %self.id, asset = %asset.display(), "asset path has no file name, skipping");
                continue;
            };
            match tokio::fs::copy(asset, self.root.join(file_name)).await {
                Ok(_) => staged += 1,
                Err(e) => tracing::warn!(
                    job_id = %self.id,
                    asset = %asset.display(),
                    error = %e,
                    "failed to stage asset, continuing without it"
                ),
            }
        }
        staged
    }

    /// Remove the sandbox directory tree.
    ///
    /// Runs at most once per sandbox; later calls are no-ops. Failures are
    /// logged, never returned, so they cannot mask the job's own outcome.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        remove_job_dir(&self.root).await;
        tracing::debug!(job_id = %self.id, "sandbox removed");
    }
}

impl Drop for JobSandbox {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        tracing::debug!(job_id = %self.id, "sandbox dropped before cleanup, removing");
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(job_id = %self.id, dir = %self.root.display(), error = %e, "failed to remove sandbox");
            }
        }
    }
}

/// Recursively delete a job directory.
///
/// A directory that is already gone counts as success, so calling this
/// twice is harmless. Other errors are logged and swallowed.
pub async fn remove_job_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove sandbox");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> tempfile::TempDir {
        match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("failed to create temp dir: {e}"),
        }
    }

    #[tokio::test]
    async fn create_lays_out_job_and_output_dirs() {
        let tmp = temp_root();
        let sandbox = match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::sanitize("cv")).await {
            Ok(s) => s,
            Err(e) => panic!("create failed: {e}"),
        };

        let dir_name = sandbox.root().file_name().map(|n| n.to_string_lossy().into_owned());
        assert_eq!(dir_name, Some(format!("xelatex-{}", sandbox.id())));
        assert!(sandbox.root().is_dir());
        assert!(sandbox.output_dir().is_dir());
        assert_eq!(sandbox.output_dir(), sandbox.root().join("output"));
        assert_eq!(sandbox.source_path(), sandbox.root().join("cv.tex"));
    }

    #[tokio::test]
    async fn create_makes_missing_tmp_root() {
        let tmp = temp_root();
        let nested = tmp.path().join("a").join("b");
        let sandbox = JobSandbox::create(&nested, Engine::Tectonic, &BaseName::default()).await;
        assert!(sandbox.is_ok(), "missing tmp root must be created");
    }

    #[tokio::test]
    async fn stage_source_writes_markup() {
        let tmp = temp_root();
        let sandbox = match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::default()).await {
            Ok(s) => s,
            Err(e) => panic!("create failed: {e}"),
        };
        if let Err(e) = sandbox.stage_source("\\documentclass{article}").await {
            panic!("stage failed: {e}");
        }
        let written = std::fs::read_to_string(sandbox.source_path()).unwrap_or_default();
        assert_eq!(written, "\\documentclass{article}");
    }

    #[tokio::test]
    async fn stage_assets_skips_missing_files() {
        let tmp = temp_root();
        let asset = tmp.path().join("fontawesome.sty");
        if let Err(e) = std::fs::write(&asset, "% style") {
            panic!("failed to write asset: {e}");
        }
        let sandbox = match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::default()).await {
            Ok(s) => s,
            Err(e) => panic!("create failed: {e}"),
        };

        let staged = sandbox
            .stage_assets(&[asset, tmp.path().join("missing.sty")])
            .await;

        assert_eq!(staged, 1, "only the existing asset is staged");
        assert!(sandbox.root().join("fontawesome.sty").is_file());
    }

    #[tokio::test]
    async fn cleanup_removes_tree_and_is_idempotent() {
        let tmp = temp_root();
        let mut sandbox = match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::default()).await {
            Ok(s) => s,
            Err(e) => panic!("create failed: {e}"),
        };
        let root = sandbox.root().to_owned();
        if let Err(e) = std::fs::write(sandbox.output_dir().join("doc.pdf"), b"%PDF") {
            panic!("failed to write artifact: {e}");
        }

        sandbox.cleanup().await;
        assert!(!root.exists(), "sandbox must be gone after cleanup");
        sandbox.cleanup().await;
        remove_job_dir(&root).await;
        remove_job_dir(&root).await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn drop_without_cleanup_removes_tree() {
        let tmp = temp_root();
        let root = {
            let sandbox = match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::default()).await {
                Ok(s) => s,
                Err(e) => panic!("create failed: {e}"),
            };
            sandbox.root().to_owned()
        };
        assert!(!root.exists(), "dropping a sandbox must remove its directory");
    }

    #[tokio::test]
    async fn concurrent_sandboxes_never_share_a_directory() {
        let tmp = temp_root();
        let mut sandboxes = Vec::new();
        for _ in 0..50 {
            match JobSandbox::create(tmp.path(), Engine::XeLaTeX, &BaseName::default()).await {
                Ok(s) => sandboxes.push(s),
                Err(e) => panic!("create failed: {e}"),
            }
        }
        let mut roots: Vec<_> = sandboxes.iter().map(|s| s.root().to_owned()).collect();
        roots.sort();
        roots.dedup();
        assert_eq!(roots.len(), 50);
    }
}
