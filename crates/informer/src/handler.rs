//! Event handlers and dispatch.
//!
//! Handlers are invoked synchronously on the watch session's task, one event
//! at a time per kind. A handler that returns an error or panics is logged
//! and the session moves on to the next event. Handlers must not block for
//! long; no timeout is enforced.

use crate::object::{ObjectKey, Tracked};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Receives lifecycle notifications for one resource kind.
pub trait EventHandler<K>: Send + Sync {
    /// Object observed for the first time.
    fn on_add(&self, obj: &K) -> anyhow::Result<()> {
        let _ = obj;
        Ok(())
    }

    /// Object changed. Periodic resync delivers `old == new`.
    fn on_update(&self, old: &K, new: &K) -> anyhow::Result<()> {
        let _ = (old, new);
        Ok(())
    }

    /// Object removed; `obj` is its last known state.
    fn on_delete(&self, obj: &K) -> anyhow::Result<()> {
        let _ = obj;
        Ok(())
    }
}

type AddFn<K> = Box<dyn Fn(&K) -> anyhow::Result<()> + Send + Sync>;
type UpdateFn<K> = Box<dyn Fn(&K, &K) -> anyhow::Result<()> + Send + Sync>;
type DeleteFn<K> = Box<dyn Fn(&K) -> anyhow::Result<()> + Send + Sync>;

/// Handler built from optional closures. Empty slots are no-ops.
pub struct HandlerFuncs<K> {
    add: Option<AddFn<K>>,
    update: Option<UpdateFn<K>>,
    delete: Option<DeleteFn<K>>,
}

impl<K> HandlerFuncs<K> {
    /// Creates a handler with every slot empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }

    /// Sets the add callback.
    #[must_use]
    pub fn with_add(mut self, f: impl Fn(&K) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    /// Sets the update callback.
    #[must_use]
    pub fn with_update(
        mut self,
        f: impl Fn(&K, &K) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    /// Sets the delete callback.
    #[must_use]
    pub fn with_delete(
        mut self,
        f: impl Fn(&K) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<K> Default for HandlerFuncs<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for HandlerFuncs<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFuncs")
            .field("add", &self.add.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<K> EventHandler<K> for HandlerFuncs<K> {
    fn on_add(&self, obj: &K) -> anyhow::Result<()> {
        self.add.as_ref().map_or(Ok(()), |f| f(obj))
    }

    fn on_update(&self, old: &K, new: &K) -> anyhow::Result<()> {
        self.update.as_ref().map_or(Ok(()), |f| f(old, new))
    }

    fn on_delete(&self, obj: &K) -> anyhow::Result<()> {
        self.delete.as_ref().map_or(Ok(()), |f| f(obj))
    }
}

/// Invokes a kind's handler with failure isolation.
pub(crate) struct Dispatcher<K> {
    kind: Arc<str>,
    handler: Arc<dyn EventHandler<K>>,
}

impl<K: Tracked> Dispatcher<K> {
    pub(crate) fn new(kind: Arc<str>, handler: Arc<dyn EventHandler<K>>) -> Self {
        Self { kind, handler }
    }

    pub(crate) fn added(&self, key: &ObjectKey, obj: &K) {
        self.invoke("add", key, || self.handler.on_add(obj));
    }

    pub(crate) fn updated(&self, key: &ObjectKey, old: &K, new: &K) {
        self.invoke("update", key, || self.handler.on_update(old, new));
    }

    pub(crate) fn deleted(&self, key: &ObjectKey, obj: &K) {
        self.invoke("delete", key, || self.handler.on_delete(obj));
    }

    fn invoke(&self, action: &str, key: &ObjectKey, call: impl FnOnce() -> anyhow::Result<()>) {
        match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(kind = %self.kind, action, %key, "handler failed: {:#}", e);
            }
            Err(payload) => {
                error!(
                    kind = %self.kind,
                    action,
                    %key,
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use std::sync::Mutex;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_slots_are_noops() {
        let handler = HandlerFuncs::<ConfigMap>::new();
        let cm = config_map("a");
        assert!(handler.on_add(&cm).is_ok());
        assert!(handler.on_update(&cm, &cm).is_ok());
        assert!(handler.on_delete(&cm).is_ok());
    }

    #[test]
    fn test_dispatcher_survives_errors_and_panics() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_add = Arc::clone(&seen);
        let handler = HandlerFuncs::new()
            .with_add(move |cm: &ConfigMap| {
                let name = cm.metadata.name.clone().unwrap_or_default();
                if name == "boom" {
                    panic!("handler exploded");
                }
                seen_add.lock().expect("lock").push(name);
                Ok(())
            })
            .with_delete(|_| anyhow::bail!("delete not supported"));

        let dispatcher = Dispatcher::new(Arc::from("ConfigMap"), Arc::new(handler));
        let key = ObjectKey::new(Some("default"), "x");

        dispatcher.added(&key, &config_map("boom"));
        dispatcher.deleted(&key, &config_map("a"));
        dispatcher.added(&key, &config_map("after"));

        assert_eq!(*seen.lock().expect("lock"), vec!["after".to_string()]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let literal: Box<dyn Any + Send> = Box::new("literal");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(literal.as_ref()), "literal");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
