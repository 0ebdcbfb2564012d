//! The collaborator traits consumed by the closeout core.

use crate::StoreResult;
use async_trait::async_trait;

/// How an upload treats an existing file at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `Conflict` if a file already exists
    Add,
    /// Replace any existing file
    Overwrite,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Overwrite => "overwrite",
        }
    }
}

/// Audience of a shared link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    TeamOnly,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::TeamOnly => "team_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// Metadata for an entry in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Display path of the entry
    pub path: String,
    pub kind: EntryKind,
    /// Size in bytes, for files
    pub size: Option<u64>,
}

/// A shared link as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    /// Path the link points at
    pub path: String,
    /// The URL exactly as the store returned it
    pub url: String,
}

/// Unified interface to the remote hierarchical object store.
///
/// Every method is one request/response round trip. Implementations must report a missing
/// path as [`StoreError::NotFound`](crate::StoreError::NotFound) and an already-occupied
/// target as [`StoreError::Conflict`](crate::StoreError::Conflict), and must not retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Retrieve the bytes of a file
    async fn download(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Store bytes at `path`, creating missing parent folders
    async fn upload(&self, path: &str, bytes: Vec<u8>, mode: WriteMode)
        -> StoreResult<EntryMetadata>;

    /// Look up a file or folder
    async fn get_metadata(&self, path: &str) -> StoreResult<EntryMetadata>;

    /// Create a folder; `Conflict` if anything already exists at `path`
    async fn create_folder(&self, path: &str) -> StoreResult<EntryMetadata>;

    /// Move a file or folder (with its contents); `Conflict` if `to` exists
    async fn move_entry(&self, from: &str, to: &str) -> StoreResult<EntryMetadata>;

    /// Create a shared link; `Conflict` if one already exists for `path`
    async fn create_shared_link(&self, path: &str, visibility: Visibility)
        -> StoreResult<SharedLink>;

    /// List the shared links that point directly at `path`
    async fn list_shared_links(&self, path: &str) -> StoreResult<Vec<SharedLink>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Source of bearer tokens for the object store.
///
/// Implementations hide how tokens are obtained or refreshed. A failure is always reported
/// as [`StoreError::Auth`](crate::StoreError::Auth).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> StoreResult<String>;
}
