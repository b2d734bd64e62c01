//! Compiler configuration.

use std::path::PathBuf;
use std::time::Duration;

use texd_core::Engine;

/// Default wall-clock limit for a single compile.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for running compile jobs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CompilerConfig {
    /// Which engine's command-line contract to use.
    pub engine: Engine,

    /// Path to (or bare name of) the compiler executable.
    pub binary_path: PathBuf,

    /// Optional program and arguments placed before the compiler,
    /// e.g. `["nice", "-n", "10"]`.
    pub launcher: Vec<String>,

    /// Hard wall-clock limit per compile.
    pub timeout: Duration,

    /// Directory under which per-job sandboxes are created.
    pub tmp_root: PathBuf,

    /// Auxiliary files copied into every sandbox before compiling.
    /// A file that cannot be staged is skipped with a warning.
    pub assets: Vec<PathBuf>,
}

impl CompilerConfig {
    /// Create a config for `engine` with the engine's default binary name,
    /// the system temp directory, and a 30 second timeout.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            binary_path: PathBuf::from(engine.slug()),
            launcher: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            tmp_root: std::env::temp_dir(),
            assets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_binary(mut self, binary_path: impl Into<PathBuf>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: Vec<String>) -> Self {
        self.launcher = launcher;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tmp_root(mut self, tmp_root: impl Into<PathBuf>) -> Self {
        self.tmp_root = tmp_root.into();
        self
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Vec<PathBuf>) -> Self {
        self.assets = assets;
        self
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new(Engine::default())
    }
}
