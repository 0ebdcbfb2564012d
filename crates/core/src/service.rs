//! The two request flows: allocate-and-upload and create-report.
//!
//! [`FormsService`] wires the allocator, composer and resolver to one store and one
//! configuration. It holds no mutable state, so a single instance is shared by every request.

use crate::config::CoreConfig;
use crate::error::{FormsError, FormsResult, Stage};
use crate::report::{ReportComposer, Section};
use crate::share::{ShareLink, ShareLinkResolver};
use crate::within_deadline;
use crate::workspace::{Workspace, WorkspaceAllocator};
use closeout_store::{path, ObjectStore, WriteMode};
use closeout_types::{NonEmptyText, PathSegment};
use std::sync::Arc;
use tracing::{info, instrument};

/// A validated create-report request.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub folder: PathSegment,
    pub employee: NonEmptyText,
    pub sections: Vec<Section>,
}

/// A decoded file destined for a workspace.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: PathSegment,
    pub bytes: Vec<u8>,
}

/// A validated upload request; `file` is `None` for allocation only.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub folder: PathSegment,
    pub file: Option<UploadFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The workspace was (re)allocated
    Allocated(Workspace),
    /// A file was written into the workspace
    Uploaded { path: String },
}

/// Entry point for both request flows.
#[derive(Clone)]
pub struct FormsService {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<CoreConfig>,
    allocator: WorkspaceAllocator,
    composer: ReportComposer,
    resolver: ShareLinkResolver,
}

impl FormsService {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<CoreConfig>) -> Self {
        Self {
            allocator: WorkspaceAllocator::new(store.clone(), cfg.clone()),
            composer: ReportComposer::new(store.clone(), cfg.clone()),
            resolver: ShareLinkResolver::new(store.clone(), cfg.clone()),
            store,
            cfg,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn allocator(&self) -> &WorkspaceAllocator {
        &self.allocator
    }

    pub fn composer(&self) -> &ReportComposer {
        &self.composer
    }

    pub fn resolver(&self) -> &ShareLinkResolver {
        &self.resolver
    }

    /// Allocates the workspace, or writes a file into it when the request carries one.
    ///
    /// Files are written with overwrite semantics to `{root}/{folder}/{file}`. The
    /// workspace is not re-allocated for file uploads; the canonical path always holds the
    /// latest submission.
    ///
    /// # Errors
    ///
    /// Allocation errors as in [`WorkspaceAllocator::allocate`]; a failed file write is
    /// reported at [`Stage::Upload`].
    #[instrument(skip(self, request), fields(folder = %request.folder))]
    pub async fn allocate_and_upload(&self, request: UploadRequest) -> FormsResult<UploadOutcome> {
        let Some(file) = request.file else {
            let workspace = self.allocator.allocate(&request.folder).await?;
            return Ok(UploadOutcome::Allocated(workspace));
        };

        let workspace_path = self.cfg.checked_workspace_path(&request.folder)?;
        let target = path::join(&workspace_path, file.name.as_str());
        let size = file.bytes.len();
        within_deadline(
            self.cfg.request_timeout(),
            self.store.upload(&target, file.bytes, WriteMode::Overwrite),
        )
        .await
        .map_err(|e| FormsError::from_store(Stage::Upload, e))?;

        info!(path = %target, size, "file uploaded");
        Ok(UploadOutcome::Uploaded { path: target })
    }

    /// Composes the report for a workspace, publishes it and returns its public link.
    ///
    /// # Errors
    ///
    /// - composition errors as in [`ReportComposer::compose`]
    /// - a failed document write at [`Stage::Publish`]
    /// - link errors as in [`ShareLinkResolver::resolve`]
    #[instrument(skip(self, request), fields(folder = %request.folder, sections = request.sections.len()))]
    pub async fn create_report(&self, request: ReportRequest) -> FormsResult<ShareLink> {
        let workspace_path = self.cfg.checked_workspace_path(&request.folder)?;
        let document = self
            .composer
            .compose(&request.employee, &request.sections, &workspace_path)
            .await?;

        let target = document.target_path().to_string();
        within_deadline(
            self.cfg.request_timeout(),
            self.store
                .upload(&target, document.into_bytes(), WriteMode::Overwrite),
        )
        .await
        .map_err(|e| FormsError::from_store(Stage::Publish, e))?;
        info!(path = %target, "report published");

        self.resolver.resolve(&target).await
    }
}
