//! Entry point for the `texd-gateway` HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use texd_compiler::CompileRunner;
use texd_gateway::{
    rate_limit::spawn_purger, routes::create_router, telemetry, AppState, CliArgs,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if let Err(e) = telemetry::init(args.log_format) {
        eprintln!("failed to install tracing subscriber: {e}");
        std::process::exit(1);
    }

    let settings = args.settings();
    let compiler = args.compiler_config();
    let engine = compiler.engine;
    let runner = CompileRunner::from_config(compiler);

    if let Err(e) = runner.health_check().await {
        warn!(engine = %engine, error = %e, "compiler not available; compile requests will fail");
    }
    if settings.api_key.is_none() {
        warn!("FLY_API_KEY is not set; /compile accepts requests without an API key");
    }

    let state = AppState::new(runner, settings);
    let purger = spawn_purger(Arc::clone(&state.limiter));
    let app = create_router(state);

    let addr = args.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, engine = %engine, "texd-gateway listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
    purger.abort();
    info!("texd-gateway stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
