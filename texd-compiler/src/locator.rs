//! Finds the artifact a compiler left in a job's output directory.
//!
//! The artifact name is not predictable from the input name: engines may
//! derive it from document metadata. The locator therefore scans by
//! extension.

use std::path::{Path, PathBuf};

use crate::CompilerError;

/// Return the artifact in `output_dir` with extension `extension`.
///
/// Candidates are regular files whose extension matches exactly
/// (case-sensitive). When several exist, the lexically smallest file name
/// wins so the choice does not depend on directory listing order.
/// `Ok(None)` means the directory holds no candidate.
///
/// # Errors
/// Returns [`CompilerError::Sandbox`] if the directory cannot be read.
pub async fn find_artifact(
    output_dir: &Path,
    extension: &str,
) -> Result<Option<PathBuf>, CompilerError> {
    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|e| CompilerError::sandbox(output_dir, e))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CompilerError::sandbox(output_dir, e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) && is_file(&entry).await {
            candidates.push(path);
        }
    }

    if candidates.len() > 1 {
        tracing::debug!(
            dir = %output_dir.display(),
            count = candidates.len(),
            "multiple artifacts found, taking the lexically first"
        );
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}

async fn is_file(entry: &tokio::fs::DirEntry) -> bool {
    entry.file_type().await.is_ok_and(|t| t.is_file())
}
