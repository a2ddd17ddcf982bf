//! Informer: one kind's watch session, cache and resync timer.

use crate::backoff::FibonacciBackoff;
use crate::error::InformerError;
use crate::handler::{Dispatcher, EventHandler};
use crate::object::Tracked;
use crate::resync::ResyncTimer;
use crate::session::{SessionStatus, WatchSession};
use crate::source::ListerWatcher;
use crate::store::{self, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Tuning shared by every informer of a controller.
#[derive(Debug, Clone)]
pub struct InformerConfig {
    /// Period of unchanged-update redelivery; zero disables it
    pub resync_period: Duration,
    /// First delay after a failed list or watch
    pub backoff_min: Duration,
    /// Cap of the retry delay
    pub backoff_max: Duration,
}

impl InformerConfig {
    /// Checks the backoff bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the minimum delay is zero or exceeds the maximum.
    pub fn validate(&self) -> Result<(), InformerError> {
        if self.backoff_min.is_zero() {
            return Err(InformerError::InvalidConfig(
                "backoff minimum must be greater than zero".to_string(),
            ));
        }
        if self.backoff_min > self.backoff_max {
            return Err(InformerError::InvalidConfig(format!(
                "backoff minimum {:?} exceeds maximum {:?}",
                self.backoff_min, self.backoff_max
            )));
        }
        Ok(())
    }
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            resync_period: Duration::from_secs(5),
            backoff_min: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

/// Keeps a local cache of one resource kind in sync with the cluster and
/// notifies a handler of every change.
#[derive(Debug)]
pub struct Informer<K> {
    kind: Arc<str>,
    session: WatchSession<K>,
    store: Store<K>,
    resync_period: Duration,
}

impl<K: Tracked> Informer<K> {
    /// Creates an informer. Nothing is listed until [`Informer::run`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub fn new(
        kind: &str,
        source: Arc<dyn ListerWatcher<K>>,
        handler: Arc<dyn EventHandler<K>>,
        config: &InformerConfig,
    ) -> Result<Self, InformerError> {
        config.validate()?;
        let kind: Arc<str> = Arc::from(kind);
        let (store, writer) = store::store();
        let dispatcher = Dispatcher::new(Arc::clone(&kind), handler);
        let backoff = FibonacciBackoff::new(config.backoff_min, config.backoff_max);
        let session = WatchSession::new(Arc::clone(&kind), source, writer, dispatcher, backoff);
        Ok(Self {
            kind,
            session,
            store,
            resync_period: config.resync_period,
        })
    }

    /// Kind label used in logs.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Read handle to the cache.
    pub fn store(&self) -> Store<K> {
        self.store.clone()
    }

    /// Subscribes to the session's phase and cursor.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.session.status()
    }

    /// Runs the session and its resync timer until `shutdown` is cancelled,
    /// returning once both have stopped.
    pub async fn run(self, shutdown: CancellationToken) {
        let (timer, ticks) = ResyncTimer::new(Arc::clone(&self.kind), self.resync_period);
        let timer_task = tokio::spawn(timer.run(shutdown.clone()));

        self.session.run(shutdown, ticks).await;

        if let Err(e) = timer_task.await {
            error!(kind = %self.kind, "resync timer task failed: {}", e);
        }
    }
}
