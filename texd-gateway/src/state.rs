//! Shared application state handed to every handler and middleware.

use std::sync::Arc;

use texd_compiler::CompileRunner;

use crate::config::GatewaySettings;
use crate::rate_limit::{InMemoryRateLimiter, RateLimitStore};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CompileRunner>,
    pub limiter: Arc<dyn RateLimitStore>,
    pub settings: Arc<GatewaySettings>,
}

impl AppState {
    /// Build state with an in-memory limiter sized from `settings`.
    pub fn new(runner: CompileRunner, settings: GatewaySettings) -> Self {
        let limiter = Arc::new(InMemoryRateLimiter::from_settings(settings.rate_limit));
        Self::with_limiter(runner, settings, limiter)
    }

    pub fn with_limiter(
        runner: CompileRunner,
        settings: GatewaySettings,
        limiter: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self { runner: Arc::new(runner), limiter, settings: Arc::new(settings) }
    }
}
