//! Subprocess compiler backend.
//!
//! Runs `xelatex` or `tectonic` as a child process in the job's sandbox,
//! captures both output streams, and enforces the wall-clock timeout by
//! killing the child.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use texd_core::Engine;
use tokio::process::Command;

use crate::backend::{CompileOutput, CompilerBackend, Invocation};
use crate::output::{clip_tail, drain_tail, CapturedPipe, MAX_DIAGNOSTIC_BYTES, PIPE_CAPTURE_LIMIT};
use crate::{CompilerConfig, CompilerError};

/// Lines of stdout kept as the diagnostic when stderr is empty.
const STDOUT_TAIL_LINES: usize = 20;

/// How long to keep draining pipes after the compiler itself has exited.
/// A lingering grandchild can hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Compiler backend that spawns the engine binary.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    engine: Engine,
    binary_path: PathBuf,
    launcher: Vec<String>,
}

impl ProcessBackend {
    /// Create a backend for `engine` using `binary_path`.
    #[must_use]
    pub fn new(engine: Engine, binary_path: PathBuf) -> Self {
        Self { engine, binary_path, launcher: Vec::new() }
    }

    /// Create a backend from the engine, binary and launcher of `config`.
    #[must_use]
    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            engine: config.engine,
            binary_path: config.binary_path.clone(),
            launcher: config.launcher.clone(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let engine_args = engine_args(self.engine, &invocation.source_path, &invocation.output_dir);

        let mut command = match self.launcher.split_first() {
            Some((program, rest)) => {
                let mut command = Command::new(program);
                command.args(rest).arg(&self.binary_path);
                command
            }
            None => Command::new(&self.binary_path),
        };

        command
            .args(engine_args)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl CompilerBackend for ProcessBackend {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn compile(
        &self,
        invocation: &Invocation,
        timeout: Duration,
    ) -> Result<CompileOutput, CompilerError> {
        let engine = self.engine;
        let started = Instant::now();

        let mut child = self.command(invocation).spawn().map_err(|e| {
            tracing::warn!(
                %engine,
                binary = %self.binary_path.display(),
                error = %e,
                "failed to spawn compiler"
            );
            CompilerError::SpawnFailed { engine, reason: e.to_string() }
        })?;

        let stdout_task = tokio::spawn(drain_tail(child.stdout.take(), PIPE_CAPTURE_LIMIT));
        let stderr_task = tokio::spawn(drain_tail(child.stderr.take(), PIPE_CAPTURE_LIMIT));

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    %engine,
                    pid = child.id(),
                    timeout_secs = timeout.as_secs(),
                    "compiler exceeded timeout, killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::error!(%engine, error = %e, "failed to kill timed-out compiler");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(CompilerError::TimedOut { engine, timeout });
            }
        };

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;

        tracing::debug!(
            %engine,
            %status,
            elapsed_ms = started.elapsed().as_millis(),
            stdout_bytes = stdout.total_bytes,
            stderr_bytes = stderr.total_bytes,
            truncated = stdout.was_truncated() || stderr.was_truncated(),
            "compiler exited"
        );

        if !status.success() {
            return Err(CompilerError::Failed {
                engine,
                exit_code: status.code(),
                diagnostic: diagnostic(status, &stdout.tail, &stderr.tail),
            });
        }

        Ok(CompileOutput { stdout: stdout.tail, stderr: stderr.tail })
    }

    async fn health_check(&self) -> Result<(), CompilerError> {
        if let Some(program) = self.launcher.first() {
            which_binary(Path::new(program))?;
        }
        which_binary(&self.binary_path)
    }
}

/// Build the engine-specific argument list.
///
/// Both engines run non-interactively: XeLaTeX via `nonstopmode`, Tectonic
/// by default.
#[must_use]
pub fn engine_args(engine: Engine, source_path: &Path, output_dir: &Path) -> Vec<OsString> {
    match engine {
        Engine::Tectonic => vec![
            OsString::from("--outdir"),
            output_dir.as_os_str().to_owned(),
            source_path.as_os_str().to_owned(),
        ],
        // XeLaTeX, plus any engine added later, takes the TeX-style flags.
        _ => {
            let mut output_flag = OsString::from("-output-directory=");
            output_flag.push(output_dir);
            vec![
                OsString::from("-interaction=nonstopmode"),
                OsString::from("-no-shell-escape"),
                output_flag,
                source_path.as_os_str().to_owned(),
            ]
        }
    }
}

async fn collect(task: tokio::task::JoinHandle<CapturedPipe>) -> CapturedPipe {
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "pipe reader task failed");
            CapturedPipe::default()
        }
        Err(_) => {
            tracing::debug!("pipe still open after compiler exit, giving up on it");
            CapturedPipe::default()
        }
    }
}

/// Pick the text surfaced to the caller for a failed run.
///
/// Standard error when it has content; otherwise the exit status followed by
/// the tail of standard output, where TeX engines report their errors.
/// Never longer than [`MAX_DIAGNOSTIC_BYTES`] plus the truncation marker.
fn diagnostic(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return clip_tail(stderr, MAX_DIAGNOSTIC_BYTES);
    }

    let stdout = String::from_utf8_lossy(stdout);
    let tail = tail_lines(&stdout, STDOUT_TAIL_LINES);
    let text = if tail.is_empty() {
        format!("process exited with {status}")
    } else {
        format!("process exited with {status}\n{tail}")
    };
    clip_tail(&text, MAX_DIAGNOSTIC_BYTES)
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Verify a binary exists either at the given path or in PATH.
fn which_binary(path: &Path) -> Result<(), CompilerError> {
    if path.components().count() > 1 || path.is_absolute() {
        if path.exists() {
            return Ok(());
        }
        return Err(CompilerError::BinaryNotFound { path: path.to_owned() });
    }

    // Bare name, check PATH
    let found = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(path).is_file()))
        .unwrap_or(false);

    if found {
        Ok(())
    } else {
        Err(CompilerError::BinaryNotFound { path: path.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xelatex_args_are_batch_mode_with_output_directory() {
        let args = engine_args(Engine::XeLaTeX, Path::new("/tmp/j/doc.tex"), Path::new("/tmp/j/output"));
        assert_eq!(
            args,
            vec![
                OsString::from("-interaction=nonstopmode"),
                OsString::from("-no-shell-escape"),
                OsString::from("-output-directory=/tmp/j/output"),
                OsString::from("/tmp/j/doc.tex"),
            ]
        );
    }

    #[test]
    fn tectonic_args_use_outdir() {
        let args = engine_args(Engine::Tectonic, Path::new("doc.tex"), Path::new("out"));
        assert_eq!(
            args,
            vec![OsString::from("--outdir"), OsString::from("out"), OsString::from("doc.tex")]
        );
    }

    #[test]
    fn tail_lines_keeps_last_n() {
        let text = "a\nb\nc\nd\n";
        assert_eq!(tail_lines(text, 2), "c\nd");
        assert_eq!(tail_lines(text, 10), "a\nb\nc\nd");
        assert_eq!(tail_lines("", 3), "");
    }

    #[cfg(unix)]
    #[test]
    fn diagnostic_prefers_stderr() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(1 << 8);
        let text = diagnostic(status, b"ignored", b"  ! Undefined control sequence.\n");
        assert_eq!(text, "! Undefined control sequence.");
    }

    #[cfg(unix)]
    #[test]
    fn diagnostic_falls_back_to_status_and_stdout_tail() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(1 << 8);
        let text = diagnostic(status, b"This is XeTeX\n! Missing $ inserted.\n", b"");
        assert!(text.starts_with("process exited with"), "got {text}");
        assert!(text.contains("! Missing $ inserted."), "stdout tail missing: {text}");
    }

    #[cfg(unix)]
    #[test]
    fn diagnostic_is_bounded_and_keeps_the_end() {
        use std::os::unix::process::ExitStatusExt;
        let status = ExitStatus::from_raw(1 << 8);
        let mut flood = vec![b'x'; PIPE_CAPTURE_LIMIT];
        flood.extend_from_slice(b"\n! Fatal error occurred, no output PDF file produced!");

        let from_stderr = diagnostic(status, b"", &flood);
        assert!(from_stderr.len() <= MAX_DIAGNOSTIC_BYTES + crate::output::TRUNCATION_MARKER.len());
        assert!(from_stderr.ends_with("no output PDF file produced!"));

        let long_lines = "y".repeat(PIPE_CAPTURE_LIMIT);
        let from_stdout = diagnostic(status, long_lines.as_bytes(), b"");
        assert!(from_stdout.len() <= MAX_DIAGNOSTIC_BYTES + crate::output::TRUNCATION_MARKER.len());
    }

    #[test]
    fn which_binary_reports_missing_absolute_path() {
        let result = which_binary(Path::new("/definitely/not/here/xelatex"));
        assert!(matches!(result, Err(CompilerError::BinaryNotFound { .. })));
    }

    #[test]
    fn which_binary_reports_missing_bare_name() {
        let result = which_binary(Path::new("texd-no-such-compiler-binary"));
        assert!(matches!(result, Err(CompilerError::BinaryNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn which_binary_finds_sh_on_path() {
        assert!(which_binary(Path::new("sh")).is_ok(), "sh must be resolvable on PATH");
    }
}
