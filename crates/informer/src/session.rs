//! Watch session.
//!
//! Owns one kind's list+watch lifecycle:
//!
//! ```text
//! Idle -> Listing -> Streaming -> Reconciling -> Streaming ... -> Stopped
//! ```
//!
//! A listing replaces the cache by key difference, announcing every
//! addition, change and removal. Streaming applies watch events in delivery
//! order. Whenever the stream ends or fails the session re-lists, so events
//! lost while disconnected are recovered from the authoritative listing
//! rather than trusted to the transport.

use crate::backoff::FibonacciBackoff;
use crate::error::InformerError;
use crate::handler::Dispatcher;
use crate::object::{ObjectKey, Tracked};
use crate::source::{ListerWatcher, Listing, WatchEvent};
use crate::store::Writer;
use futures::StreamExt;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Lifecycle phase of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, not yet running
    Idle,
    /// Performing the initial listing
    Listing,
    /// Consuming a watch stream
    Streaming,
    /// Re-listing after the watch stream ended
    Reconciling,
    /// Cancelled; no further dispatch happens
    Stopped,
}

/// Observable state of a watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current phase
    pub phase: SessionPhase,
    /// Watch cursor: the last applied resource version
    pub resource_version: Option<String>,
}

/// How a watch stream came to an end.
enum StreamOutcome {
    /// Server closed the stream or the cursor expired
    Ended,
    /// Opening or reading the stream failed
    Failed(InformerError),
    /// Shutdown requested
    Cancelled,
}

/// Runs the list+watch protocol for one resource kind.
pub struct WatchSession<K> {
    kind: Arc<str>,
    source: Arc<dyn ListerWatcher<K>>,
    writer: Writer<K>,
    dispatcher: Dispatcher<K>,
    backoff: FibonacciBackoff,
    cursor: Option<String>,
    status: watch::Sender<SessionStatus>,
}

impl<K> std::fmt::Debug for WatchSession<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("kind", &self.kind)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<K: Tracked> WatchSession<K> {
    pub(crate) fn new(
        kind: Arc<str>,
        source: Arc<dyn ListerWatcher<K>>,
        writer: Writer<K>,
        dispatcher: Dispatcher<K>,
        backoff: FibonacciBackoff,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus {
            phase: SessionPhase::Idle,
            resource_version: None,
        });
        Self {
            kind,
            source,
            writer,
            dispatcher,
            backoff,
            cursor: None,
            status,
        }
    }

    /// Subscribes to phase and cursor changes.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Runs until `shutdown` is cancelled. Transport failures are logged and
    /// retried; nothing is returned because nothing is fatal.
    pub async fn run(mut self, shutdown: CancellationToken, mut resync: mpsc::Receiver<()>) {
        info!(kind = %self.kind, "starting watch session");
        let mut phase = SessionPhase::Listing;

        loop {
            self.set_phase(phase);
            let listed = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                listed = self.source.list() => listed,
            };

            match listed {
                Ok(listing) => {
                    self.backoff.reset();
                    self.replace(listing);
                }
                Err(e) => {
                    let delay = self.backoff.next_backoff();
                    warn!(kind = %self.kind, "list failed: {}, retrying in {:?}", e, delay);
                    if !sleep_or_cancel(delay, &shutdown).await {
                        break;
                    }
                    continue;
                }
            }

            match self.stream(&shutdown, &mut resync).await {
                StreamOutcome::Cancelled => break,
                StreamOutcome::Ended => {
                    debug!(kind = %self.kind, "watch stream ended, reconciling");
                }
                StreamOutcome::Failed(e) => {
                    let delay = self.backoff.next_backoff();
                    warn!(kind = %self.kind, "watch failed: {}, reconciling in {:?}", e, delay);
                    if !sleep_or_cancel(delay, &shutdown).await {
                        break;
                    }
                }
            }
            phase = SessionPhase::Reconciling;
        }

        self.set_phase(SessionPhase::Stopped);
        info!(kind = %self.kind, "watch session stopped");
    }

    /// Opens a watch from the cursor and applies events until the stream
    /// ends. The stream, and with it the connection, is dropped on every
    /// return path.
    async fn stream(
        &mut self,
        shutdown: &CancellationToken,
        resync: &mut mpsc::Receiver<()>,
    ) -> StreamOutcome {
        let cursor = self.cursor.clone().unwrap_or_default();
        let opened = tokio::select! {
            biased;
            () = shutdown.cancelled() => return StreamOutcome::Cancelled,
            opened = self.source.watch(&cursor) => opened,
        };
        let mut events = match opened {
            Ok(events) => events,
            Err(e) => return StreamOutcome::Failed(e),
        };
        self.set_phase(SessionPhase::Streaming);
        debug!(kind = %self.kind, resource_version = %cursor, "watching");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => return StreamOutcome::Cancelled,
                Some(()) = resync.recv() => self.resync(),
                next = events.next() => match next {
                    Some(Ok(event)) => self.apply(event),
                    Some(Err(e)) => return StreamOutcome::Failed(e),
                    None => return StreamOutcome::Ended,
                },
            }
        }
    }

    /// Reconciles the cache against a full listing and resets the cursor.
    fn replace(&mut self, listing: Listing<K>) {
        let Listing {
            items,
            resource_version,
        } = listing;
        let mut listed = BTreeSet::new();

        for obj in items {
            let Some(key) = ObjectKey::for_object(&obj) else {
                warn!(kind = %self.kind, "dropping listed object without a name");
                continue;
            };
            listed.insert(key.clone());
            self.upsert(key, obj);
        }

        let reader = self.writer.as_reader();
        for key in reader.keys() {
            if listed.contains(&key) {
                continue;
            }
            if let Some(old) = self.writer.delete(&key) {
                debug!(kind = %self.kind, %key, "object gone from listing");
                self.dispatcher.deleted(&key, &old);
            }
        }

        info!(
            kind = %self.kind,
            count = reader.len(),
            %resource_version,
            "cache synced with listing"
        );
        self.set_cursor(resource_version);
    }

    /// Applies one watch event to the cache and dispatches it.
    fn apply(&mut self, event: WatchEvent<K>) {
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                let resource_version = obj.resource_version();
                match ObjectKey::for_object(&obj) {
                    Some(key) => self.upsert(key, obj),
                    None => warn!(kind = %self.kind, "dropping event for object without a name"),
                }
                self.advance(resource_version);
            }
            WatchEvent::Deleted(obj) => {
                let resource_version = obj.resource_version();
                match ObjectKey::for_object(&obj) {
                    Some(key) => {
                        if self.writer.delete(&key).is_some() {
                            self.dispatcher.deleted(&key, &obj);
                        } else {
                            trace!(kind = %self.kind, %key, "delete for unknown object ignored");
                        }
                    }
                    None => warn!(kind = %self.kind, "dropping event for object without a name"),
                }
                self.advance(resource_version);
            }
            WatchEvent::Bookmark { resource_version } => {
                trace!(kind = %self.kind, %resource_version, "bookmark");
                self.set_cursor(resource_version);
            }
        }
    }

    /// Inserts or replaces `obj`, dispatching add or update. An object equal
    /// to the cached one is a duplicate delivery and dispatches nothing.
    fn upsert(&mut self, key: ObjectKey, obj: K) {
        let new = Arc::new(obj);
        let reader = self.writer.as_reader();
        match reader.get(&key) {
            Some(old) if *old == *new => {
                trace!(kind = %self.kind, %key, "unchanged object ignored");
            }
            Some(old) => {
                self.writer.put(key.clone(), Arc::clone(&new));
                self.dispatcher.updated(&key, &old, &new);
            }
            None => {
                self.writer.put(key.clone(), Arc::clone(&new));
                self.dispatcher.added(&key, &new);
            }
        }
    }

    /// Re-delivers every cached object as an unchanged update.
    fn resync(&self) {
        let objects = self.writer.as_reader().list();
        debug!(kind = %self.kind, count = objects.len(), "resync");
        for obj in objects {
            if let Some(key) = ObjectKey::for_object(&*obj) {
                self.dispatcher.updated(&key, &obj, &obj);
            }
        }
    }

    fn advance(&mut self, resource_version: Option<String>) {
        if let Some(resource_version) = resource_version {
            self.set_cursor(resource_version);
        }
    }

    fn set_cursor(&mut self, resource_version: String) {
        self.cursor = Some(resource_version.clone());
        self.status.send_modify(|status| {
            status.resource_version = Some(resource_version);
        });
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.status.send_if_modified(|status| {
            let changed = status.phase != phase;
            status.phase = phase;
            changed
        });
    }
}

/// Sleeps for `delay`; returns `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
