//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the workspace's `closeout-run` wrapper.
//!
//! ## Intended use
//! Useful for development against the in-memory store (`CLOSEOUT_STORE=memory`) when you only
//! want the HTTP surface and the Swagger UI.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone REST API server
///
/// # Environment Variables
/// - `CLOSEOUT_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLOSEOUT_STORE`: `dropbox` (default) or `memory`
/// - `FORMS_*` and `DROPBOX_*`: see `closeout_core::config::env` and `api_rest::bootstrap`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or store credentials are invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("closeout_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let lookup = |name: &str| std::env::var(name).ok();
    let addr = api_rest::bootstrap::rest_addr(lookup);

    tracing::info!("-- Starting Closeout REST API on {}", addr);

    let state = api_rest::bootstrap::state_from(lookup)?;
    api_rest::serve(&addr, state).await
}
