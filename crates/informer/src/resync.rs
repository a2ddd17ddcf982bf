//! Periodic resync ticks.
//!
//! The timer only signals; the session owning the store performs the resync
//! dispatch, so resync and watch events for a kind are never dispatched
//! concurrently. Ticks that arrive while one is still pending are coalesced.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Sends a resync tick to its session every `period`.
#[derive(Debug)]
pub struct ResyncTimer {
    kind: Arc<str>,
    period: Duration,
    ticks: mpsc::Sender<()>,
}

impl ResyncTimer {
    /// Creates the timer and the receiving end its session listens on.
    pub fn new(kind: Arc<str>, period: Duration) -> (Self, mpsc::Receiver<()>) {
        let (ticks, rx) = mpsc::channel(1);
        (Self { kind, period, ticks }, rx)
    }

    /// Runs until cancelled or until the session drops its receiver.
    /// A zero period disables resync and returns immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        if self.period.is_zero() {
            debug!(kind = %self.kind, "resync disabled");
            return;
        }

        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match self.ticks.try_send(()) {
                        Ok(()) => trace!(kind = %self.kind, "resync tick"),
                        Err(mpsc::error::TrySendError::Full(())) => {
                            trace!(kind = %self.kind, "resync tick coalesced");
                        }
                        Err(mpsc::error::TrySendError::Closed(())) => break,
                    }
                }
            }
        }
        debug!(kind = %self.kind, "resync timer stopped");
    }
}
