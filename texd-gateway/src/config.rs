//! Gateway configuration, sourced from the environment and CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{builder::BoolishValueParser, ArgAction, Parser, ValueEnum};
use texd_compiler::CompilerConfig;
use texd_core::Engine;

/// Origins allowed when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "https://easycv.vercel.app",
    "https://jobsprout.ai",
    "http://localhost:3000",
    "https://localhost:3000",
];

/// Default request body cap: 10 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Command-line arguments for the gateway binary. Every flag can also be
/// set through the environment variable named next to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "texd-gateway", version, about = "LaTeX to PDF compilation service")]
pub struct CliArgs {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// Shared secret expected in the `x-api-key` header. Unset disables the check.
    #[arg(long = "api-key", env = "FLY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Comma-separated list of allowed CORS origins.
    #[arg(
        long = "allowed-origins",
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_ALLOWED_ORIGINS.map(String::from)
    )]
    pub allowed_origins: Vec<String>,

    /// Typesetting engine: `xelatex` or `tectonic`.
    #[arg(long, env = "TEXD_ENGINE", default_value = "xelatex")]
    pub engine: Engine,

    /// Compiler executable; defaults to the engine name on `PATH`.
    #[arg(long = "compiler-bin", env = "TEXD_COMPILER_BIN", value_name = "PATH")]
    pub compiler_bin: Option<PathBuf>,

    /// Whitespace-separated command prefixed to the compiler, e.g. `nice -n 10`.
    #[arg(long = "compiler-launcher", env = "TEXD_COMPILER_LAUNCHER")]
    pub compiler_launcher: Option<String>,

    /// Wall-clock limit per compile, in seconds.
    #[arg(
        long = "compile-timeout-secs",
        env = "TEXD_COMPILE_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub compile_timeout_secs: u64,

    /// Directory under which job sandboxes are created; defaults to the system temp dir.
    #[arg(long = "tmp-root", env = "TEXD_TMP_ROOT", value_name = "PATH")]
    pub tmp_root: Option<PathBuf>,

    /// Comma-separated auxiliary files (e.g. `fontawesome.sty`) staged into every job.
    #[arg(long = "assets", env = "TEXD_ASSETS", value_delimiter = ',', value_name = "PATH")]
    pub assets: Vec<PathBuf>,

    /// Rate-limit window, in seconds.
    #[arg(
        long = "rate-limit-window-secs",
        env = "RATE_LIMIT_WINDOW_SECS",
        default_value_t = 900,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub rate_limit_window_secs: u64,

    /// Requests allowed per client per window.
    #[arg(long = "rate-limit-max", env = "RATE_LIMIT_MAX", default_value_t = 100)]
    pub rate_limit_max: u32,

    /// Maximum request body size, in bytes.
    #[arg(long = "body-limit-bytes", env = "BODY_LIMIT_BYTES", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit_bytes: usize,

    /// Key the rate limiter by the left-most `X-Forwarded-For` entry.
    #[arg(
        long = "trust-proxy",
        env = "TRUST_PROXY",
        value_name = "BOOL",
        action = ArgAction::Set,
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    pub trust_proxy: bool,

    /// Log output format.
    #[arg(long = "log-format", env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl CliArgs {
    /// `host:port` to bind.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// HTTP-layer settings.
    #[must_use]
    pub fn settings(&self) -> GatewaySettings {
        GatewaySettings {
            api_key: self.api_key.clone().filter(|key| !key.is_empty()),
            allowed_origins: self
                .allowed_origins
                .iter()
                .map(|o| o.trim().to_owned())
                .filter(|o| !o.is_empty())
                .collect(),
            rate_limit: RateLimitSettings {
                window: Duration::from_secs(self.rate_limit_window_secs),
                max_requests: self.rate_limit_max,
            },
            body_limit: self.body_limit_bytes,
            trust_proxy: self.trust_proxy,
        }
    }

    /// Compiler settings.
    #[must_use]
    pub fn compiler_config(&self) -> CompilerConfig {
        let mut config = CompilerConfig::new(self.engine)
            .with_timeout(Duration::from_secs(self.compile_timeout_secs))
            .with_assets(self.assets.clone());
        if let Some(bin) = &self.compiler_bin {
            config = config.with_binary(bin.clone());
        }
        if let Some(launcher) = &self.compiler_launcher {
            config = config.with_launcher(launcher.split_whitespace().map(str::to_owned).collect());
        }
        if let Some(tmp_root) = &self.tmp_root {
            config = config.with_tmp_root(tmp_root.clone());
        }
        config
    }
}

/// Rate limiter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { window: Duration::from_secs(15 * 60), max_requests: 100 }
    }
}

/// Settings consumed by the HTTP layer.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Expected `x-api-key` value. `None` disables the check.
    pub api_key: Option<String>,
    /// Exact-match `Origin` allow-list.
    pub allowed_origins: Vec<String>,
    pub rate_limit: RateLimitSettings,
    /// Request body cap in bytes.
    pub body_limit: usize,
    /// Trust `X-Forwarded-For` for client identity.
    pub trust_proxy: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.map(String::from).to_vec(),
            rate_limit: RateLimitSettings::default(),
            body_limit: DEFAULT_BODY_LIMIT,
            trust_proxy: false,
        }
    }
}
