//! ListerWatcher trait
//!
//! Abstracts the cluster API behind the two calls the list+watch protocol
//! needs. The kube-backed implementation lives in [`crate::kube_source`];
//! tests use the scripted implementation in `mock` (feature `test-util`).

use crate::error::InformerError;
use futures::stream::BoxStream;

/// Result of a full listing.
#[derive(Debug, Clone)]
pub struct Listing<K> {
    /// Every object currently in the collection
    pub items: Vec<K>,
    /// Version of the collection the listing was taken at
    pub resource_version: String,
}

/// One incremental change received from a watch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    /// Object created
    Added(K),
    /// Object changed
    Modified(K),
    /// Object removed; carries its last state
    Deleted(K),
    /// Progress notification without an object change
    Bookmark {
        /// Version the stream has progressed to
        resource_version: String,
    },
}

/// Stream of watch events. The stream ends when the server closes it or the
/// requested resource version is too old; callers must re-list in both cases.
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, InformerError>>;

/// Trait for cluster list/watch operations on a single resource kind
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ListerWatcher<K>: Send + Sync {
    /// List the whole collection.
    async fn list(&self) -> Result<Listing<K>, InformerError>;

    /// Open a watch stream starting after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError>;
}
