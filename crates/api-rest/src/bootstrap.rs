//! Startup wiring shared by the server binaries.
//!
//! Everything here runs once, before the first request. Handlers never read the environment.

use crate::{AppState, DEFAULT_MAX_BODY_BYTES};
use anyhow::Context;
use closeout_core::config::parse_env_value;
use closeout_core::{CoreConfig, FormsService};
use closeout_store::{backend, BackendKind, DropboxCredentials};
use std::sync::Arc;

pub const REST_ADDR: &str = "CLOSEOUT_REST_ADDR";
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
pub const STORE: &str = "CLOSEOUT_STORE";
pub const MAX_BODY_BYTES: &str = "FORMS_MAX_BODY_BYTES";
pub const DROPBOX_APP_KEY: &str = "DROPBOX_APP_KEY";
pub const DROPBOX_APP_SECRET: &str = "DROPBOX_APP_SECRET";
pub const DROPBOX_REFRESH_TOKEN: &str = "DROPBOX_REFRESH_TOKEN";

/// Address the REST server binds to.
pub fn rest_addr(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(REST_ADDR)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REST_ADDR.into())
}

/// Resolves configuration, opens the store backend and builds the application state.
///
/// # Errors
/// Returns an error if a configuration value is invalid, the backend name is unknown, or the
/// Dropbox credentials are missing.
pub fn state_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<AppState> {
    let cfg = CoreConfig::from_lookup(&lookup).context("invalid forms configuration")?;
    let max_body_bytes: usize =
        parse_env_value(MAX_BODY_BYTES, lookup(MAX_BODY_BYTES), DEFAULT_MAX_BODY_BYTES)
            .context("invalid body size limit")?;
    if max_body_bytes == 0 {
        anyhow::bail!("{MAX_BODY_BYTES} must be greater than zero");
    }

    let kind = match lookup(STORE).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.parse::<BackendKind>().map_err(anyhow::Error::msg)?,
        None => BackendKind::default(),
    };
    let credentials = DropboxCredentials {
        app_key: lookup(DROPBOX_APP_KEY).unwrap_or_default(),
        app_secret: lookup(DROPBOX_APP_SECRET).unwrap_or_default(),
        refresh_token: lookup(DROPBOX_REFRESH_TOKEN).unwrap_or_default(),
    };
    let store = backend::open(kind, credentials, cfg.request_timeout())
        .with_context(|| format!("failed to open {kind} store"))?;

    tracing::info!(
        store = %kind,
        root = cfg.root_prefix(),
        fallback = cfg.fallback_asset(),
        max_body_bytes,
        "configuration resolved"
    );
    Ok(AppState::new(FormsService::new(store, Arc::new(cfg))).with_max_body_bytes(max_body_bytes))
}
