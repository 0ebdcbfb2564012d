//! Share-link resolution.
//!
//! Object stores hand out one canonical link per object: creating a second one fails with a
//! conflict. Resolution is therefore get-or-create. Links are normalised so the browser
//! renders the object instead of offering a download page.

use crate::config::CoreConfig;
use crate::error::{FormsError, FormsResult, Stage};
use crate::within_deadline;
use closeout_store::{ObjectStore, StoreError, Visibility};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DOWNLOAD_PAGE_PARAM: &str = "dl=0";
const RAW_PARAM: &str = "raw=1";

/// A public link to an object in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub object_path: String,
    pub url: String,
}

#[derive(Clone)]
pub struct ShareLinkResolver {
    store: Arc<dyn ObjectStore>,
    cfg: Arc<CoreConfig>,
}

impl ShareLinkResolver {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<CoreConfig>) -> Self {
        Self { store, cfg }
    }

    /// Returns the public link for `object_path`, creating it if it does not exist yet.
    ///
    /// Calling this repeatedly for the same object yields the same URL.
    ///
    /// # Errors
    ///
    /// - `FormsError::Auth` if the store rejects the credentials on creation
    /// - `FormsError::LinkUnavailable` if no link could be created and none is listed
    #[instrument(skip(self))]
    pub async fn resolve(&self, object_path: &str) -> FormsResult<ShareLink> {
        let timeout = self.cfg.request_timeout();
        let created = within_deadline(
            timeout,
            self.store.create_shared_link(object_path, Visibility::Public),
        )
        .await;

        let raw_url = match created {
            Ok(link) => link.url,
            Err(StoreError::Auth(message)) => {
                return Err(FormsError::Auth {
                    stage: Stage::Share,
                    message,
                })
            }
            Err(create_error) => {
                if !create_error.is_conflict() {
                    warn!(error = %create_error, "link creation failed; looking for an existing link");
                }
                self.existing_link(object_path, &create_error).await?
            }
        };

        let url = normalise_share_url(&raw_url);
        info!(%url, "share link resolved");
        Ok(ShareLink {
            object_path: object_path.to_string(),
            url,
        })
    }

    async fn existing_link(
        &self,
        object_path: &str,
        create_error: &StoreError,
    ) -> FormsResult<String> {
        let listed = within_deadline(
            self.cfg.request_timeout(),
            self.store.list_shared_links(object_path),
        )
        .await;

        match listed {
            Ok(links) => links.into_iter().next().map(|l| l.url).ok_or_else(|| {
                FormsError::LinkUnavailable {
                    path: object_path.to_string(),
                    reason: format!("creation failed ({create_error}) and no link exists"),
                }
            }),
            Err(list_error) => Err(FormsError::LinkUnavailable {
                path: object_path.to_string(),
                reason: format!("creation failed ({create_error}); listing failed ({list_error})"),
            }),
        }
    }
}

/// Rewrites a `dl=0` query parameter to `raw=1`.
///
/// Any other URL is returned unchanged, so the function is idempotent.
pub fn normalise_share_url(url: &str) -> String {
    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, tail)) => (head, Some(tail)),
        None => (url, None),
    };
    let Some((base, query)) = without_fragment.split_once('?') else {
        return url.to_string();
    };

    let mut changed = false;
    let params: Vec<&str> = query
        .split('&')
        .map(|param| {
            if param == DOWNLOAD_PAGE_PARAM {
                changed = true;
                RAW_PARAM
            } else {
                param
            }
        })
        .collect();
    if !changed {
        return url.to_string();
    }

    let mut out = format!("{base}?{}", params.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use closeout_store::{MemoryStore, Operation, WriteMode};

    const REPORT: &str = "/forms/branch12/report.html";

    async fn setup() -> (Arc<MemoryStore>, ShareLinkResolver) {
        let store = Arc::new(MemoryStore::new());
        store
            .upload(REPORT, b"<html></html>".to_vec(), WriteMode::Overwrite)
            .await
            .unwrap();
        let resolver = ShareLinkResolver::new(store.clone(), Arc::new(CoreConfig::with_defaults()));
        (store, resolver)
    }

    #[test]
    fn test_normalise_rewrites_dl_marker() {
        assert_eq!(
            normalise_share_url("https://host/s/abc/report.html?dl=0"),
            "https://host/s/abc/report.html?raw=1"
        );
        assert_eq!(
            normalise_share_url("https://host/scl/fi/abc/report.html?rlkey=xyz&dl=0"),
            "https://host/scl/fi/abc/report.html?rlkey=xyz&raw=1"
        );
        assert_eq!(
            normalise_share_url("https://host/s/abc?dl=0#top"),
            "https://host/s/abc?raw=1#top"
        );
    }

    #[test]
    fn test_normalise_leaves_other_urls_alone() {
        for url in [
            "https://host/s/abc/report.html",
            "https://host/s/abc/report.html?raw=1",
            "https://host/s/abc/report.html?dl=1",
            "https://host/s/abc/report.html?xdl=0",
            "https://host/s/abc#dl=0",
        ] {
            assert_eq!(normalise_share_url(url), url);
        }
    }

    #[test]
    fn test_normalise_is_idempotent() {
        let once = normalise_share_url("https://host/s/abc/report.html?dl=0");
        assert_eq!(normalise_share_url(&once), once);
    }

    #[tokio::test]
    async fn test_resolve_creates_link() {
        let (_store, resolver) = setup().await;

        let link = resolver.resolve(REPORT).await.unwrap();

        assert_eq!(link.object_path, REPORT);
        assert!(link.url.ends_with("report.html?raw=1"));
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_url() {
        let (_store, resolver) = setup().await;

        let first = resolver.resolve(REPORT).await.unwrap();
        let second = resolver.resolve(REPORT).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_transport_failure_on_create_falls_back_to_listing() {
        let (store, resolver) = setup().await;
        let existing = resolver.resolve(REPORT).await.unwrap();
        store.fail_on(
            Operation::CreateSharedLink,
            REPORT,
            StoreError::Transport("bad gateway".into()),
        );

        let link = resolver.resolve(REPORT).await.unwrap();

        assert_eq!(link, existing);
    }

    #[tokio::test]
    async fn test_unavailable_when_create_fails_and_none_exists() {
        let (store, resolver) = setup().await;
        store.fail_on(
            Operation::CreateSharedLink,
            REPORT,
            StoreError::Transport("bad gateway".into()),
        );

        let result = resolver.resolve(REPORT).await;

        assert!(matches!(result, Err(FormsError::LinkUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_unavailable_when_both_calls_fail() {
        let (store, resolver) = setup().await;
        resolver.resolve(REPORT).await.unwrap();
        store.fail_on(
            Operation::CreateSharedLink,
            REPORT,
            StoreError::Transport("bad gateway".into()),
        );
        store.fail_on(
            Operation::ListSharedLinks,
            REPORT,
            StoreError::Timeout(std::time::Duration::from_secs(15)),
        );

        let result = resolver.resolve(REPORT).await;

        assert!(matches!(result, Err(FormsError::LinkUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_missing_object_is_unavailable() {
        let (_store, resolver) = setup().await;

        let result = resolver.resolve("/forms/branch12/absent.html").await;

        assert!(matches!(result, Err(FormsError::LinkUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_auth_failure_propagates() {
        let (store, resolver) = setup().await;
        store.fail_on(
            Operation::CreateSharedLink,
            REPORT,
            StoreError::Auth("expired token".into()),
        );

        let result = resolver.resolve(REPORT).await;

        assert!(matches!(
            result,
            Err(FormsError::Auth {
                stage: Stage::Share,
                ..
            })
        ));
    }
}
