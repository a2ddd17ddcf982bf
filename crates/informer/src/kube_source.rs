//! Kubernetes API lister/watcher.
//!
//! Implements [`ListerWatcher`] over `kube::Api`, scoped to one namespace or
//! to the whole cluster.

use crate::error::InformerError;
use crate::source::{ListerWatcher, Listing, WatchEvent, WatchStream};
use futures::{future, StreamExt};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, WatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// Server-side watch timeout in seconds. Must stay below the API server's
/// own limit (300s) or the request is rejected.
const WATCH_TIMEOUT_SECS: u32 = 290;

/// HTTP status the API server reports when a watch starts from a compacted
/// resource version.
const GONE: u16 = 410;

/// Label and field selectors applied to both list and watch requests.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    /// Label selector, e.g. `app=web`
    pub labels: Option<String>,
    /// Field selector, e.g. `status.phase=Running`
    pub fields: Option<String>,
}

impl Selector {
    fn list_params(&self) -> ListParams {
        let mut lp = ListParams::default();
        if let Some(labels) = &self.labels {
            lp = lp.labels(labels);
        }
        if let Some(fields) = &self.fields {
            lp = lp.fields(fields);
        }
        lp
    }

    fn watch_params(&self) -> WatchParams {
        let mut wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECS);
        if let Some(labels) = &self.labels {
            wp = wp.labels(labels);
        }
        if let Some(fields) = &self.fields {
            wp = wp.fields(fields);
        }
        wp
    }
}

/// Lists and watches one namespaced resource kind through the kube client.
#[derive(Clone)]
pub struct KubeListerWatcher<K> {
    api: Api<K>,
    selector: Selector,
}

impl<K> KubeListerWatcher<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    /// Creates a lister/watcher. `namespace` of `None` watches all namespaces.
    pub fn new(client: Client, namespace: Option<&str>, selector: Selector) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self { api, selector }
    }
}

impl<K> Debug for KubeListerWatcher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeListerWatcher")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<K> ListerWatcher<K> for KubeListerWatcher<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self) -> Result<Listing<K>, InformerError> {
        let list = self.api.list(&self.selector.list_params()).await?;
        let resource_version = list.metadata.resource_version.unwrap_or_default();
        debug!(count = list.items.len(), %resource_version, "listed objects");
        Ok(Listing {
            items: list.items,
            resource_version,
        })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError> {
        let stream = self
            .api
            .watch(&self.selector.watch_params(), resource_version)
            .await?;

        // A 410 means our cursor was compacted away: end the stream so the
        // session re-lists instead of treating it as a failure.
        let events = stream
            .take_while(|event| {
                let expired = matches!(
                    event,
                    Ok(kube::api::WatchEvent::Error(status)) if status.code == GONE
                );
                if expired {
                    debug!("watch resource version expired");
                }
                future::ready(!expired)
            })
            .map(|event| match event {
                Ok(kube::api::WatchEvent::Added(obj)) => Ok(WatchEvent::Added(obj)),
                Ok(kube::api::WatchEvent::Modified(obj)) => Ok(WatchEvent::Modified(obj)),
                Ok(kube::api::WatchEvent::Deleted(obj)) => Ok(WatchEvent::Deleted(obj)),
                Ok(kube::api::WatchEvent::Bookmark(bookmark)) => Ok(WatchEvent::Bookmark {
                    resource_version: bookmark.metadata.resource_version,
                }),
                Ok(kube::api::WatchEvent::Error(status)) => {
                    Err(InformerError::Watch(format!("{status:?}")))
                }
                Err(e) => Err(InformerError::Kube(e)),
            })
            .boxed();

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_params() {
        let selector = Selector {
            labels: Some("app=web".to_string()),
            fields: None,
        };
        let lp = selector.list_params();
        assert_eq!(lp.label_selector.as_deref(), Some("app=web"));
        assert!(lp.field_selector.is_none());

        let wp = selector.watch_params();
        assert_eq!(wp.label_selector.as_deref(), Some("app=web"));
        assert_eq!(wp.timeout, Some(WATCH_TIMEOUT_SECS));
    }
}
