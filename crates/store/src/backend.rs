//! Backend selection for binaries.

use crate::{
    DropboxConfig, DropboxStore, MemoryStore, ObjectStore, RefreshTokenProvider, StoreResult,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Which [`ObjectStore`] implementation to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Dropbox,
    /// Process-local store, lost on exit
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dropbox" => Ok(Self::Dropbox),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown store backend '{other}' (expected 'dropbox' or 'memory')"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dropbox => "dropbox",
            Self::Memory => "memory",
        })
    }
}

/// App credentials for the refresh-token grant.
#[derive(Clone, Default)]
pub struct DropboxCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for DropboxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxCredentials")
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

/// Opens the selected backend.
///
/// # Errors
///
/// For [`BackendKind::Dropbox`], returns `StoreError::Auth` if a credential is blank and
/// `StoreError::Transport` if an HTTP client cannot be built.
pub fn open(
    kind: BackendKind,
    credentials: DropboxCredentials,
    request_timeout: Duration,
) -> StoreResult<Arc<dyn ObjectStore>> {
    match kind {
        BackendKind::Memory => Ok(Arc::new(MemoryStore::new())),
        BackendKind::Dropbox => {
            let tokens = RefreshTokenProvider::new(
                credentials.app_key,
                credentials.app_secret,
                credentials.refresh_token,
                request_timeout,
            )?;
            let config = DropboxConfig {
                request_timeout,
                ..DropboxConfig::default()
            };
            Ok(Arc::new(DropboxStore::new(config, Arc::new(tokens))?))
        }
    }
}
