//! In-process object store.
//!
//! `MemoryStore` mirrors the semantics of the remote store closely enough to exercise the
//! allocator, composer and resolver without a network: parent folders are created on upload,
//! moves carry descendants along, and at most one shared link exists per path.
//!
//! Every operation yields to the scheduler once before touching state, so concurrent callers
//! interleave per round trip the way they would against a remote store. Failures can be
//! injected per operation and path with [`MemoryStore::fail_on`], and slow round trips with
//! [`MemoryStore::delay_on`].

use crate::object_store::{
    EntryKind, EntryMetadata, ObjectStore, SharedLink, Visibility, WriteMode,
};
use crate::{path, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::instrument;

/// Store operations that can be targeted by injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Download,
    Upload,
    GetMetadata,
    CreateFolder,
    Move,
    CreateSharedLink,
    ListSharedLinks,
}

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Node>,
    links: BTreeMap<String, String>,
    next_link_id: u64,
}

/// Object store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<HashMap<(Operation, String), StoreError>>,
    delays: Mutex<HashMap<(Operation, String), Duration>>,
    downloads_in_flight: AtomicUsize,
    max_downloads_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future `operation` on `path` fail with `error`.
    ///
    /// For `Move` the path is the source path.
    pub fn fail_on(&self, operation: Operation, path: impl Into<String>, error: StoreError) {
        lock(&self.faults).insert((operation, path.into()), error);
    }

    /// Removes a failure previously registered with [`Self::fail_on`].
    pub fn clear_failure(&self, operation: Operation, path: &str) {
        lock(&self.faults).remove(&(operation, path.to_string()));
    }

    /// Makes every future `operation` on `path` take `delay` before it touches state.
    pub fn delay_on(&self, operation: Operation, path: impl Into<String>, delay: Duration) {
        lock(&self.delays).insert((operation, path.into()), delay);
    }

    pub fn clear_delay(&self, operation: Operation, path: &str) {
        lock(&self.delays).remove(&(operation, path.to_string()));
    }

    /// Returns true if a file or folder exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        path == "/" || lock(&self.state).entries.contains_key(path)
    }

    /// Returns true if `path` is a folder.
    pub fn is_folder(&self, path: &str) -> bool {
        path == "/" || matches!(lock(&self.state).entries.get(path), Some(Node::Folder))
    }

    /// Returns the bytes of the file at `path`, if any.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match lock(&self.state).entries.get(path) {
            Some(Node::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Returns the paths of all direct and nested children of `folder`, sorted.
    pub fn descendants(&self, folder: &str) -> Vec<String> {
        lock(&self.state)
            .entries
            .keys()
            .filter(|key| key.as_str() != folder && path::is_within(key, folder))
            .cloned()
            .collect()
    }

    /// Highest number of downloads observed in flight at the same time.
    pub fn max_downloads_in_flight(&self) -> usize {
        self.max_downloads_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, operation: Operation, target: &str) -> StoreResult<()> {
        tokio::task::yield_now().await;
        let delay = lock(&self.delays)
            .get(&(operation, target.to_string()))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        path::validate(target)?;
        if let Some(error) = lock(&self.faults).get(&(operation, target.to_string())) {
            return Err(error.clone());
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn metadata_for(path: &str, node: &Node) -> EntryMetadata {
    match node {
        Node::Folder => EntryMetadata {
            path: path.to_string(),
            kind: EntryKind::Folder,
            size: None,
        },
        Node::File(bytes) => EntryMetadata {
            path: path.to_string(),
            kind: EntryKind::File,
            size: Some(bytes.len() as u64),
        },
    }
}

impl State {
    /// Creates every missing ancestor folder of `target`.
    fn ensure_parents(&mut self, target: &str) -> StoreResult<()> {
        let mut ancestors = Vec::new();
        let mut current = path::parent(target);
        while let Some(dir) = current {
            if dir == "/" {
                break;
            }
            ancestors.push(dir.to_string());
            current = path::parent(dir);
        }
        for dir in ancestors.into_iter().rev() {
            match self.entries.get(&dir) {
                Some(Node::Folder) => {}
                Some(Node::File(_)) => {
                    return Err(StoreError::Conflict(format!("{dir} is a file")));
                }
                None => {
                    self.entries.insert(dir, Node::Folder);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    #[instrument(skip(self), fields(store = "memory"))]
    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        let in_flight = self.downloads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_downloads_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let result = match self.enter(Operation::Download, path).await {
            Ok(()) => match lock(&self.state).entries.get(path) {
                Some(Node::File(bytes)) => Ok(bytes.clone()),
                Some(Node::Folder) => Err(StoreError::Conflict(format!("{path} is a folder"))),
                None => Err(StoreError::NotFound(path.to_string())),
            },
            Err(e) => Err(e),
        };

        self.downloads_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    #[instrument(skip(self, bytes), fields(store = "memory", size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mode: WriteMode,
    ) -> StoreResult<EntryMetadata> {
        self.enter(Operation::Upload, path).await?;
        if path == "/" {
            return Err(StoreError::InvalidPath("cannot upload to root".into()));
        }

        let mut state = lock(&self.state);
        match (state.entries.get(path), mode) {
            (Some(Node::Folder), _) => {
                return Err(StoreError::Conflict(format!("{path} is a folder")));
            }
            (Some(Node::File(_)), WriteMode::Add) => {
                return Err(StoreError::Conflict(format!("{path} already exists")));
            }
            _ => {}
        }
        state.ensure_parents(path)?;
        let node = Node::File(bytes);
        let metadata = metadata_for(path, &node);
        state.entries.insert(path.to_string(), node);
        Ok(metadata)
    }

    #[instrument(skip(self), fields(store = "memory"))]
    async fn get_metadata(&self, path: &str) -> StoreResult<EntryMetadata> {
        self.enter(Operation::GetMetadata, path).await?;
        if path == "/" {
            return Ok(metadata_for(path, &Node::Folder));
        }
        lock(&self.state)
            .entries
            .get(path)
            .map(|node| metadata_for(path, node))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    #[instrument(skip(self), fields(store = "memory"))]
    async fn create_folder(&self, path: &str) -> StoreResult<EntryMetadata> {
        self.enter(Operation::CreateFolder, path).await?;

        let mut state = lock(&self.state);
        if path == "/" || state.entries.contains_key(path) {
            return Err(StoreError::Conflict(format!("{path} already exists")));
        }
        state.ensure_parents(path)?;
        state.entries.insert(path.to_string(), Node::Folder);
        Ok(metadata_for(path, &Node::Folder))
    }

    #[instrument(skip(self), fields(store = "memory"))]
    async fn move_entry(&self, from: &str, to: &str) -> StoreResult<EntryMetadata> {
        self.enter(Operation::Move, from).await?;
        path::validate(to)?;
        if path::is_within(to, from) {
            return Err(StoreError::InvalidPath(format!(
                "cannot move {from} into itself"
            )));
        }

        let mut state = lock(&self.state);
        let Some(node) = state.entries.get(from).cloned() else {
            return Err(StoreError::NotFound(from.to_string()));
        };
        if state.entries.contains_key(to) {
            return Err(StoreError::Conflict(format!("{to} already exists")));
        }
        state.ensure_parents(to)?;

        let moved: Vec<String> = state
            .entries
            .keys()
            .filter(|key| path::is_within(key, from))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = state.entries.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                state.entries.insert(new, entry);
            }
        }

        let relinked: Vec<String> = state
            .links
            .keys()
            .filter(|key| path::is_within(key, from))
            .cloned()
            .collect();
        for old in relinked {
            if let Some(url) = state.links.remove(&old) {
                let new = format!("{to}{}", &old[from.len()..]);
                state.links.insert(new, url);
            }
        }

        Ok(metadata_for(to, &node))
    }

    #[instrument(skip(self), fields(store = "memory"))]
    async fn create_shared_link(
        &self,
        path: &str,
        _visibility: Visibility,
    ) -> StoreResult<SharedLink> {
        self.enter(Operation::CreateSharedLink, path).await?;

        let mut state = lock(&self.state);
        if !state.entries.contains_key(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if state.links.contains_key(path) {
            return Err(StoreError::Conflict(format!(
                "shared link already exists for {path}"
            )));
        }
        state.next_link_id += 1;
        let url = format!(
            "https://memory.store/s/{:04}/{}?dl=0",
            state.next_link_id,
            path::file_name(path)
        );
        state.links.insert(path.to_string(), url.clone());
        Ok(SharedLink {
            path: path.to_string(),
            url,
        })
    }

    #[instrument(skip(self), fields(store = "memory"))]
    async fn list_shared_links(&self, path: &str) -> StoreResult<Vec<SharedLink>> {
        self.enter(Operation::ListSharedLinks, path).await?;

        Ok(lock(&self.state)
            .links
            .get(path)
            .map(|url| SharedLink {
                path: path.to_string(),
                url: url.clone(),
            })
            .into_iter()
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
