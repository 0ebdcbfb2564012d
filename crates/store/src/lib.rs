//! Closeout object storage
//!
//! This crate defines the seams through which the closeout core talks to the remote
//! hierarchical object store, and ships the backends that sit behind them.
//!
//! ## Design Principles
//!
//! - Every store call is a single request/response round trip
//! - Failures are classified into a small taxonomy ([`StoreError`]) so callers can branch on
//!   `NotFound` and `Conflict` without inspecting backend-specific payloads
//! - Backends never retry; retry and fallback policy belongs to the caller
//! - Credentials are obtained through a [`TokenProvider`], never read per request
//!
//! ## Path Model
//!
//! Paths are absolute, `/`-separated strings in the style of the remote store:
//!
//! ```text
//! /forms/
//! ├── logo.png              # fallback asset
//! ├── branch12/             # workspace for the latest submission
//! │   ├── a.jpg
//! │   └── report.html
//! └── branch12_ver1/        # earlier submission, renamed aside
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use closeout_store::{MemoryStore, ObjectStore, WriteMode};
//!
//! # async fn demo() -> Result<(), closeout_store::StoreError> {
//! let store = MemoryStore::new();
//! store.create_folder("/forms/branch12").await?;
//! store
//!     .upload("/forms/branch12/a.jpg", vec![0xff, 0xd8], WriteMode::Overwrite)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod dropbox;
mod memory;
mod object_store;
pub mod path;
mod token;

use std::time::Duration;

pub use backend::{BackendKind, DropboxCredentials};
pub use dropbox::{DropboxConfig, DropboxStore};
pub use memory::{MemoryStore, Operation};
pub use object_store::{
    EntryKind, EntryMetadata, ObjectStore, SharedLink, TokenProvider, Visibility, WriteMode,
};
pub use token::{RefreshTokenProvider, StaticTokenProvider};

/// Errors that can occur during object store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The path (or the shared link for it) does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The target already exists, or the operation clashes with existing state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials were rejected or could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request could not be completed (network failure, unexpected status)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The path is not a well-formed absolute store path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The store answered with a payload that could not be understood
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true for failures of the transport itself.
    ///
    /// A timeout is deliberately in the same class as any other transport failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
