//! Install and activate phases of a proxy version.
//!
//! Install pre-warms the static namespace from the manifest and is
//! all-or-nothing. Activate reclaims every namespace left behind by earlier
//! versions.

use std::fmt;

use chrono::Utc;
use edgecache_core::{CacheEntry, Error};

use crate::request::RequestDescriptor;
use crate::state::ProxyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Installed,
    Activated,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Installed => "installed",
            Phase::Activated => "activated",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Drives one version of the proxy through install and activate.
#[derive(Debug)]
pub struct LifecycleController {
    state: ProxyState,
    manifest: Vec<String>,
    phase: Phase,
}

impl LifecycleController {
    pub fn new(state: ProxyState, manifest: Vec<String>) -> Self {
        Self { state, manifest, phase: Phase::Pending }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fetch every manifest URL and write the lot into the static namespace.
    ///
    /// All fetches complete before anything is written, so a single failure
    /// leaves the store untouched. Returns the number of entries written.
    pub async fn install(&mut self) -> Result<usize, Error> {
        if self.phase != Phase::Pending {
            return Err(Error::Lifecycle(format!("install requires pending phase, found {}", self.phase)));
        }

        match self.prewarm().await {
            Ok(count) => {
                self.phase = Phase::Installed;
                Ok(count)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                tracing::error!(error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn prewarm(&self) -> Result<usize, Error> {
        let namespace = self.state.static_namespace();
        let mut entries = Vec::with_capacity(self.manifest.len());

        for raw in &self.manifest {
            let url = self.state.resolve_url(raw).map_err(|e| Error::InstallFailed(format!("{raw}: {e}")))?;
            let req = RequestDescriptor::get(url);
            let response = self
                .state
                .fetch_origin(&req)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {}", req.url, e)))?;
            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{}: status {}", req.url, response.status)));
            }
            entries.push(CacheEntry::capture(
                req.key(),
                response.status,
                response.headers,
                response.body.to_vec(),
                Utc::now(),
            ));
        }

        let db = self.state.db();
        db.open_namespace(&namespace).await?;
        db.put_entries(&namespace, &entries).await?;

        tracing::info!(namespace = %namespace, entries = entries.len(), "install complete");
        Ok(entries.len())
    }

    /// Delete every namespace that belongs to neither current version.
    ///
    /// Returns the names that were reclaimed.
    pub async fn activate(&mut self) -> Result<Vec<String>, Error> {
        if self.phase != Phase::Installed {
            return Err(Error::Lifecycle(format!("activate requires installed phase, found {}", self.phase)));
        }

        let db = self.state.db();
        let tags = self.state.tags();
        let mut reclaimed = Vec::new();
        for name in db.list_namespaces().await? {
            if tags.is_current(&name) {
                continue;
            }
            if db.delete_namespace(&name).await? {
                tracing::info!(namespace = %name, "reclaimed stale namespace");
                reclaimed.push(name);
            }
        }
        db.open_namespace(&self.state.dynamic_namespace()).await?;

        self.phase = Phase::Activated;
        Ok(reclaimed)
    }

    /// Install then activate. A failed install skips activation.
    pub async fn run(&mut self) -> Result<Vec<String>, Error> {
        self.install().await?;
        self.activate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeOrigin, proxy, proxy_with_tags};
    use edgecache_core::{RequestKey, VersionTags};
    use std::collections::BTreeSet;
    use url::Url;

    fn manifest(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    fn app_origin() -> FakeOrigin {
        FakeOrigin::new()
            .respond("https://app.example.com/", 200, "<html>")
            .respond("https://app.example.com/app.css", 200, "body{}")
    }

    #[tokio::test]
    async fn test_install_writes_every_manifest_entry() {
        let (state, _origin) = proxy(app_origin()).await;
        let mut lifecycle = LifecycleController::new(state.clone(), manifest(&["/", "/app.css"]));

        assert_eq!(lifecycle.install().await.unwrap(), 2);
        assert_eq!(lifecycle.phase(), Phase::Installed);
        assert_eq!(state.db().count_entries(&state.static_namespace()).await.unwrap(), 2);

        let key = RequestKey::get(&Url::parse("https://app.example.com/app.css").unwrap());
        let entry = state.lookup(&state.static_namespace(), &key).await.unwrap();
        assert_eq!(entry.body, b"body{}");
        assert!(entry.captured_at().is_some());
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let (state, _origin) = proxy(app_origin()).await;
        let mut lifecycle = LifecycleController::new(state.clone(), manifest(&["/", "/app.css", "/missing.js"]));

        let result = lifecycle.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(lifecycle.phase(), Phase::Failed);
        assert!(!state.db().namespace_exists(&state.static_namespace()).await.unwrap());
    }

    #[tokio::test]
    async fn test_install_rejects_non_success() {
        let origin = app_origin().respond("https://app.example.com/gone", 404, "");
        let (state, _origin) = proxy(origin).await;
        let mut lifecycle = LifecycleController::new(state.clone(), manifest(&["/", "/gone"]));

        assert!(matches!(lifecycle.install().await, Err(Error::InstallFailed(_))));
        assert!(!state.db().namespace_exists(&state.static_namespace()).await.unwrap());
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let (state, _origin) = proxy(app_origin()).await;
        let urls = manifest(&["/", "/app.css"]);

        LifecycleController::new(state.clone(), urls.clone()).install().await.unwrap();
        let first: Vec<_> =
            state.db().list_entries(&state.static_namespace()).await.unwrap().into_iter().map(|e| e.key).collect();

        LifecycleController::new(state.clone(), urls).install().await.unwrap();
        let second: Vec<_> =
            state.db().list_entries(&state.static_namespace()).await.unwrap().into_iter().map(|e| e.key).collect();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_activate_keeps_only_current_namespaces() {
        let (state, _origin) = proxy_with_tags(app_origin(), VersionTags::new("edgecache", "v2", "v2")).await;
        let db = state.db();
        db.open_namespace("edgecache-static-v1").await.unwrap();
        db.open_namespace("edgecache-dynamic-v1").await.unwrap();
        db.open_namespace("someone-else").await.unwrap();

        let mut lifecycle = LifecycleController::new(state.clone(), manifest(&["/"]));
        let mut reclaimed = lifecycle.run().await.unwrap();
        reclaimed.sort();

        assert_eq!(reclaimed, vec!["edgecache-dynamic-v1", "edgecache-static-v1", "someone-else"]);
        let expected: BTreeSet<String> =
            ["edgecache-dynamic-v2", "edgecache-static-v2"].into_iter().map(String::from).collect();
        assert_eq!(db.list_namespaces().await.unwrap(), expected);
        assert_eq!(lifecycle.phase(), Phase::Activated);
    }

    #[tokio::test]
    async fn test_activate_on_first_run() {
        let (state, _origin) = proxy(app_origin()).await;
        let mut lifecycle = LifecycleController::new(state.clone(), Vec::new());

        assert_eq!(lifecycle.install().await.unwrap(), 0);
        assert!(lifecycle.activate().await.unwrap().is_empty());
        assert!(state.db().namespace_exists(&state.dynamic_namespace()).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let (state, _origin) = proxy(app_origin()).await;
        let mut lifecycle = LifecycleController::new(state, manifest(&["/"]));
        assert!(matches!(lifecycle.activate().await, Err(Error::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_failed_run_skips_activate() {
        let (state, _origin) = proxy(FakeOrigin::new()).await;
        state.db().open_namespace("edgecache-static-v0").await.unwrap();

        let mut lifecycle = LifecycleController::new(state.clone(), manifest(&["/"]));
        assert!(lifecycle.run().await.is_err());
        assert!(state.db().namespace_exists("edgecache-static-v0").await.unwrap());
    }
}
