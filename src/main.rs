use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::bootstrap;

/// Main entry point for the close-out forms service
///
/// Resolves configuration from the environment (after loading `.env` if present), opens the
/// configured object store and serves the REST API until interrupted.
///
/// # Environment Variables
/// - `CLOSEOUT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLOSEOUT_STORE`: `dropbox` (default) or `memory`
/// - `FORMS_ROOT`: Root folder for workspaces (default: "/forms")
/// - `FORMS_FALLBACK_ASSET`: Fallback image and header logo (default: "{root}/logo.png")
/// - `FORMS_REQUEST_TIMEOUT_SECS`: Deadline per store call (default: 15)
/// - `FORMS_MAX_ALLOCATION_ATTEMPTS`: Allocation attempt budget (default: 25)
/// - `FORMS_IMAGE_FAN_OUT`: Concurrent image downloads per section, 1-8 (default: 4)
/// - `DROPBOX_APP_KEY`, `DROPBOX_APP_SECRET`, `DROPBOX_REFRESH_TOKEN`: Dropbox credentials
///
/// # Returns
/// * `Ok(())` - If the server shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup or the server itself fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("closeout_run=info".parse()?)
                .add_directive("closeout_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let lookup = |name: &str| std::env::var(name).ok();
    let rest_addr = bootstrap::rest_addr(lookup);
    let state = bootstrap::state_from(lookup)?;

    tracing::info!(
        "++ Starting closeout {} REST on {}",
        closeout_core::constants::VERSION,
        rest_addr
    );

    tokio::select! {
        result = api_rest::serve(&rest_addr, state) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("-- Shutting down"),
    }

    Ok(())
}
