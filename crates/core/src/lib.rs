//! # Closeout Core
//!
//! Core business logic for the branch close-out forms service.
//!
//! This crate contains the policies that sit between the REST surface and the object store:
//! - Workspace allocation with the rename-forward policy ([`WorkspaceAllocator`])
//! - Report composition that degrades to a fallback image instead of failing
//!   ([`ReportComposer`])
//! - Idempotent share-link resolution ([`ShareLinkResolver`])
//! - Request validation and the two request flows ([`FormsService`])
//!
//! **No API concerns**: HTTP routing, status codes and wire types belong in `api-rest` and
//! `api-shared`; byte transport and credentials belong in `closeout_store`.

pub mod config;
pub mod constants;
pub mod error;
mod html;
pub mod report;
pub mod service;
pub mod share;
pub mod validation;
pub mod workspace;

pub use closeout_store::{ObjectStore, StoreError};
pub use closeout_types::{NonEmptyText, PathSegment};
pub use config::{CoreConfig, Limits};
pub use constants::DEFAULT_ROOT_PREFIX;
pub use error::{FormsError, FormsResult, Stage};
pub use report::{expects_photo, ImageSlot, RenderedSection, ReportComposer, ReportDocument, Section};
pub use service::{FormsService, ReportRequest, UploadFile, UploadOutcome, UploadRequest};
pub use share::{normalise_share_url, ShareLink, ShareLinkResolver};
pub use workspace::{Workspace, WorkspaceAllocator};

use std::future::Future;
use std::time::Duration;

/// Runs one store call under `limit`; an elapsed deadline becomes `StoreError::Timeout`.
pub(crate) async fn within_deadline<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}
