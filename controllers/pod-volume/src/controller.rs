//! Main controller implementation.
//!
//! The `Controller` owns one informer for Pods and one for
//! PersistentVolumeClaims and runs them side by side until stopped. The pod
//! handler reads the claim cache, so claims are wired first.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::handlers::{ClaimHandler, PodHandler};
use crate::recorder::Recorder;
use informer::{Informer, KubeListerWatcher, ListerWatcher, Selector, Store};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Keeps Pod and PersistentVolumeClaim caches in sync with the cluster.
pub struct Controller {
    pods: Informer<Pod>,
    claims: Informer<PersistentVolumeClaim>,
    shutdown_grace: Duration,
}

impl Controller {
    /// Creates a controller watching the configured namespace through `client`.
    ///
    /// Nothing is listed until [`Controller::run`].
    pub fn new(
        client: Client,
        config: &ControllerConfig,
        recorder: Arc<dyn Recorder>,
    ) -> Result<Self, ControllerError> {
        let ns = config.namespace.as_deref();
        info!(
            "Initializing controller for {}",
            ns.unwrap_or("all namespaces")
        );
        let pod_source = KubeListerWatcher::<Pod>::new(client.clone(), ns, Selector::default());
        let claim_source =
            KubeListerWatcher::<PersistentVolumeClaim>::new(client, ns, Selector::default());
        Self::with_sources(Arc::new(pod_source), Arc::new(claim_source), config, recorder)
    }

    /// Creates a controller over arbitrary sources.
    pub fn with_sources(
        pod_source: Arc<dyn ListerWatcher<Pod>>,
        claim_source: Arc<dyn ListerWatcher<PersistentVolumeClaim>>,
        config: &ControllerConfig,
        recorder: Arc<dyn Recorder>,
    ) -> Result<Self, ControllerError> {
        let claims = Informer::new(
            "PersistentVolumeClaim",
            claim_source,
            Arc::new(ClaimHandler::new(Arc::clone(&recorder))),
            &config.informer,
        )?;
        let pods = Informer::new(
            "Pod",
            pod_source,
            Arc::new(PodHandler::new(claims.store(), recorder)),
            &config.informer,
        )?;
        Ok(Self {
            pods,
            claims,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Read handle to the pod cache.
    pub fn pod_store(&self) -> Store<Pod> {
        self.pods.store()
    }

    /// Read handle to the claim cache.
    pub fn claim_store(&self) -> Store<PersistentVolumeClaim> {
        self.claims.store()
    }

    /// Runs both informers until `stop` is cancelled.
    ///
    /// After the stop signal, informers get `shutdown_grace` to wind down;
    /// any still running afterwards are aborted.
    pub async fn run(self, stop: CancellationToken) {
        info!("Starting informers");
        let mut tasks = JoinSet::new();
        tasks.spawn(self.claims.run(stop.child_token()));
        tasks.spawn(self.pods.run(stop.child_token()));

        stop.cancelled().await;
        info!("Stop requested, waiting for informers");

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Informer task failed: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "Informers still running after {:?}, aborting",
                self.shutdown_grace
            );
            tasks.shutdown().await;
        }
        info!("Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::MemoryRecorder;
    use informer::MockListerWatcher;
    use kube::api::ObjectMeta;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        }
    }

    fn config() -> ControllerConfig {
        let mut config = ControllerConfig::default();
        config.informer.resync_period = Duration::ZERO;
        config.informer.backoff_min = Duration::from_millis(10);
        config.informer.backoff_max = Duration::from_millis(50);
        config.shutdown_grace = Duration::from_secs(1);
        config
    }

    async fn wait_until(check: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_run_fills_both_caches_and_stops() {
        let pods = MockListerWatcher::new();
        pods.push_list(
            vec![Pod {
                metadata: meta("web-0"),
                ..Default::default()
            }],
            "10",
        );
        let claims = MockListerWatcher::new();
        claims.push_list(
            vec![
                PersistentVolumeClaim {
                    metadata: meta("data-0"),
                    ..Default::default()
                },
                PersistentVolumeClaim {
                    metadata: meta("data-1"),
                    ..Default::default()
                },
            ],
            "20",
        );

        let recorder = Arc::new(MemoryRecorder::default());
        let controller = Controller::with_sources(
            Arc::new(pods.clone()),
            Arc::new(claims.clone()),
            &config(),
            recorder.clone(),
        )
        .expect("controller builds");
        let pod_store = controller.pod_store();
        let claim_store = controller.claim_store();

        let stop = CancellationToken::new();
        let run = tokio::spawn(controller.run(stop.clone()));

        wait_until(|| pod_store.len() == 1 && claim_store.len() == 2).await;
        wait_until(|| pods.watch_calls() == ["10"] && claims.watch_calls() == ["20"]).await;
        assert_eq!(recorder.reasons().len(), 3);

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run returns after stop")
            .expect("run task does not panic");
    }

    #[tokio::test]
    async fn test_one_kind_failing_does_not_block_the_other() {
        let pods = MockListerWatcher::<Pod>::new();
        pods.push_list_error("connection refused");
        let claims = MockListerWatcher::<PersistentVolumeClaim>::new();
        claims.push_list(
            vec![PersistentVolumeClaim {
                metadata: meta("data-0"),
                ..Default::default()
            }],
            "7",
        );

        let controller = Controller::with_sources(
            Arc::new(pods.clone()),
            Arc::new(claims),
            &config(),
            Arc::new(MemoryRecorder::default()),
        )
        .expect("controller builds");
        let pod_store = controller.pod_store();
        let claim_store = controller.claim_store();

        let stop = CancellationToken::new();
        let run = tokio::spawn(controller.run(stop.clone()));

        wait_until(|| claim_store.len() == 1 && pods.list_calls() >= 2).await;
        assert!(pod_store.is_empty());

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run returns while pods are still retrying")
            .expect("run task does not panic");
    }

    #[test]
    fn test_invalid_informer_config_rejected() {
        let mut bad = config();
        bad.informer.backoff_min = Duration::ZERO;
        let result = Controller::with_sources(
            Arc::new(MockListerWatcher::<Pod>::new()),
            Arc::new(MockListerWatcher::<PersistentVolumeClaim>::new()),
            &bad,
            Arc::new(MemoryRecorder::default()),
        );
        assert!(matches!(result, Err(ControllerError::Informer(_))));
    }
}
