//! Mock ListerWatcher for unit testing
//!
//! Plays back scripted listings and watch streams in order, recording the
//! resource version every watch was opened from. When the scripts run out,
//! `list` fails and `watch` returns a stream that never yields, which parks a
//! session in `Streaming` until it is cancelled.

use crate::error::InformerError;
use crate::source::{ListerWatcher, Listing, WatchEvent, WatchStream};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum ScriptedWatch<K> {
    /// Yields the events, then ends or stays open
    Events {
        events: Vec<Result<WatchEvent<K>, InformerError>>,
        hang: bool,
    },
    /// Opening the watch fails
    Fail(InformerError),
}

struct MockState<K> {
    lists: VecDeque<Result<Listing<K>, InformerError>>,
    watches: VecDeque<ScriptedWatch<K>>,
    list_calls: usize,
    watch_calls: Vec<String>,
}

/// Mock lister/watcher for testing
///
/// Clones share the same script, so a test can keep one handle and hand
/// another to the informer.
pub struct MockListerWatcher<K> {
    state: Arc<Mutex<MockState<K>>>,
}

impl<K> Clone for MockListerWatcher<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K> std::fmt::Debug for MockListerWatcher<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockListerWatcher")
            .field("pending_lists", &state.lists.len())
            .field("pending_watches", &state.watches.len())
            .field("list_calls", &state.list_calls)
            .field("watch_calls", &state.watch_calls)
            .finish()
    }
}

impl<K> Default for MockListerWatcher<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> MockListerWatcher<K> {
    /// Create a mock with empty scripts
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                lists: VecDeque::new(),
                watches: VecDeque::new(),
                list_calls: 0,
                watch_calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful listing
    pub fn push_list(&self, items: Vec<K>, resource_version: &str) -> &Self {
        self.lock().lists.push_back(Ok(Listing {
            items,
            resource_version: resource_version.to_string(),
        }));
        self
    }

    /// Queue a failed listing
    pub fn push_list_error(&self, message: &str) -> &Self {
        self.lock()
            .lists
            .push_back(Err(InformerError::Transport(message.to_string())));
        self
    }

    /// Queue a watch stream that yields `events` and then ends
    pub fn push_watch(&self, events: Vec<WatchEvent<K>>) -> &Self {
        self.lock().watches.push_back(ScriptedWatch::Events {
            events: events.into_iter().map(Ok).collect(),
            hang: false,
        });
        self
    }

    /// Queue a watch stream that yields `events` and then stays open
    pub fn push_watch_then_hang(&self, events: Vec<WatchEvent<K>>) -> &Self {
        self.lock().watches.push_back(ScriptedWatch::Events {
            events: events.into_iter().map(Ok).collect(),
            hang: true,
        });
        self
    }

    /// Queue a watch stream that yields `events` and then an error item
    pub fn push_watch_then_error(&self, events: Vec<WatchEvent<K>>, message: &str) -> &Self {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(InformerError::Watch(message.to_string())));
        self.lock().watches.push_back(ScriptedWatch::Events {
            events: items,
            hang: false,
        });
        self
    }

    /// Queue a watch that fails to open
    pub fn push_watch_error(&self, message: &str) -> &Self {
        self.lock()
            .watches
            .push_back(ScriptedWatch::Fail(InformerError::Transport(
                message.to_string(),
            )));
        self
    }

    /// Number of `list` calls so far
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Resource versions every `watch` call was opened from
    pub fn watch_calls(&self) -> Vec<String> {
        self.lock().watch_calls.clone()
    }
}

#[async_trait::async_trait]
impl<K> ListerWatcher<K> for MockListerWatcher<K>
where
    K: Send + Sync + 'static,
{
    async fn list(&self) -> Result<Listing<K>, InformerError> {
        let mut state = self.lock();
        state.list_calls += 1;
        state
            .lists
            .pop_front()
            .unwrap_or_else(|| Err(InformerError::Transport("no scripted listing".to_string())))
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<K>, InformerError> {
        let mut state = self.lock();
        state.watch_calls.push(resource_version.to_string());
        match state.watches.pop_front() {
            Some(ScriptedWatch::Events { events, hang: false }) => Ok(stream::iter(events).boxed()),
            Some(ScriptedWatch::Events { events, hang: true }) => {
                Ok(stream::iter(events).chain(stream::pending()).boxed())
            }
            Some(ScriptedWatch::Fail(e)) => Err(e),
            None => Ok(stream::pending().boxed()),
        }
    }
}
