//! HTTP surface for the texd LaTeX compilation service.
//!
//! Exposes `POST /compile` and `GET /health`, gates requests by origin,
//! API key and per-client rate limit, and maps compiler outcomes onto
//! PDF or JSON error responses.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{CliArgs, GatewaySettings, LogFormat, RateLimitSettings};
pub use error::GatewayError;
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimitStore};
pub use routes::create_router;
pub use state::AppState;
