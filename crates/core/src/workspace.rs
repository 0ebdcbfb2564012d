//! Workspace allocation.
//!
//! Each form submission gets its own folder under the root prefix. Allocation follows the
//! rename-forward policy: the canonical folder name always refers to the latest submission,
//! and a folder already occupying that name is moved aside to the lowest free `_verN` path
//! instead of being deleted.
//!
//! ```text
//! Checking ──absent──▶ Creating ──▶ Done
//!    │                    │conflict
//!    │◀───────────────────┘
//!    └──exists──▶ ProbingFreeSuffix ──▶ Renaming ──▶ Creating ──▶ Done
//!                                          │conflict     │conflict
//!                      back to Checking ◀──┴─────────────┘
//! ```
//!
//! Every pass through `Checking` consumes one attempt from a fixed budget, so concurrent
//! callers racing for the same name settle without unbounded retries.

use crate::config::CoreConfig;
use crate::constants::VERSION_SUFFIX;
use crate::error::{FormsError, FormsResult, Stage};
use crate::within_deadline;
use closeout_store::{EntryKind, ObjectStore, StoreError};
use closeout_types::PathSegment;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A folder allocated for one form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// The canonical path requested
    pub base_path: String,
    /// The collision-free path now in use
    pub resolved_path: String,
    /// `0` if the base name was free; otherwise the version the previous occupant moved to
    pub version: u32,
    /// Where the previous occupant was preserved, if there was one
    pub preserved_as: Option<String>,
}

/// Result of one pass through the state machine.
enum Pass {
    Done(Workspace),
    Retry,
}

/// Allocates collision-free workspaces under the configured root prefix.
#[derive(Clone)]
pub struct WorkspaceAllocator {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<CoreConfig>,
}

impl WorkspaceAllocator {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Allocates the workspace for `folder`, returning `{root}/{folder}`.
    ///
    /// If the folder already exists it is moved to `{root}/{folder}_verN` (lowest free `N`)
    /// and a fresh empty folder is created in its place.
    ///
    /// # Errors
    ///
    /// - `FormsError::InvalidInput` if the workspace would contain or replace the fallback asset
    /// - `FormsError::WorkspaceOccupied` if a file sits at the workspace path
    /// - `FormsError::AllocationExhausted` if the attempt budget runs out
    /// - `FormsError::Auth` if the store rejects the credentials
    /// - `FormsError::Store` for any other store failure that is not a conflict, a missing
    ///   path or a transport failure
    pub async fn allocate(&self, folder: &PathSegment) -> FormsResult<Workspace> {
        let base = self.cfg.checked_workspace_path(folder)?;
        self.allocate_path(&base).await
    }

    #[instrument(skip(self), fields(store = self.store.name()))]
    async fn allocate_path(&self, base: &str) -> FormsResult<Workspace> {
        let max_attempts = self.cfg.limits().max_allocation_attempts;
        let mut first_candidate = 1;

        for attempt in 1..=max_attempts {
            match self.pass(base, &mut first_candidate).await? {
                Pass::Done(workspace) => {
                    info!(
                        path = %workspace.resolved_path,
                        version = workspace.version,
                        attempt,
                        "workspace allocated"
                    );
                    return Ok(workspace);
                }
                Pass::Retry => debug!(attempt, "allocation pass lost a race; retrying"),
            }
        }

        warn!(attempts = max_attempts, "allocation budget exhausted");
        Err(FormsError::AllocationExhausted {
            base: base.to_string(),
            attempts: max_attempts,
        })
    }

    async fn pass(&self, base: &str, first_candidate: &mut u32) -> FormsResult<Pass> {
        // Checking
        let exists = match self.call(self.store.get_metadata(base)).await {
            Ok(meta) if meta.kind == EntryKind::File => {
                warn!(path = base, "workspace path holds a file; refusing to move it");
                return Err(FormsError::WorkspaceOccupied {
                    path: base.to_string(),
                });
            }
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                self.recoverable(e)?;
                return Ok(Pass::Retry);
            }
        };

        if !exists {
            return match self.call(self.store.create_folder(base)).await {
                Ok(_) => Ok(Pass::Done(Workspace {
                    base_path: base.to_string(),
                    resolved_path: base.to_string(),
                    version: 0,
                    preserved_as: None,
                })),
                Err(e) => self.recoverable(e).map(|()| Pass::Retry),
            };
        }

        // ProbingFreeSuffix
        let Some((version, preserved_as)) =
            self.find_free_version(base, *first_candidate).await?
        else {
            return Ok(Pass::Retry);
        };
        *first_candidate = version;

        // Renaming
        if let Err(e) = self.call(self.store.move_entry(base, &preserved_as)).await {
            if e.is_not_found() {
                debug!("base folder moved away by a concurrent allocation");
                return Ok(Pass::Retry);
            }
            self.recoverable(e)?;
            return Ok(Pass::Retry);
        }
        info!(from = base, to = %preserved_as, "previous workspace preserved");

        // Creating
        match self.call(self.store.create_folder(base)).await {
            Ok(_) => Ok(Pass::Done(Workspace {
                base_path: base.to_string(),
                resolved_path: base.to_string(),
                version,
                preserved_as: Some(preserved_as),
            })),
            Err(e) => self.recoverable(e).map(|()| Pass::Retry),
        }
    }

    /// Probes `base_verK` for `K = start, start + 1, ...` until one is absent.
    ///
    /// Returns `Ok(None)` when a transport failure interrupts probing.
    async fn find_free_version(&self, base: &str, start: u32) -> FormsResult<Option<(u32, String)>> {
        let max_version = self.cfg.limits().max_version_suffix;
        for version in start..=max_version {
            let candidate = versioned_path(base, version);
            match self.call(self.store.get_metadata(&candidate)).await {
                Ok(_) => continue,
                Err(e) if e.is_not_found() => return Ok(Some((version, candidate))),
                Err(e) => {
                    self.recoverable(e)?;
                    return Ok(None);
                }
            }
        }
        Err(FormsError::AllocationExhausted {
            base: base.to_string(),
            attempts: max_version,
        })
    }

    async fn call<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        within_deadline(self.cfg.request_timeout(), call).await
    }

    /// Conflicts and transport failures send the allocator back to `Checking`; anything else
    /// ends the allocation.
    fn recoverable(&self, error: StoreError) -> FormsResult<()> {
        if error.is_conflict() {
            debug!(%error, "conflict during allocation");
            Ok(())
        } else if error.is_transient() {
            warn!(%error, "transport failure during allocation");
            Ok(())
        } else {
            Err(FormsError::from_store(Stage::Allocate, error))
        }
    }
}

/// `{base}_ver{version}`
pub fn versioned_path(base: &str, version: u32) -> String {
    format!("{base}{VERSION_SUFFIX}{version}")
}
