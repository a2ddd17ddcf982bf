//! Pod and PersistentVolumeClaim event handlers.
//!
//! The pod handler relates every pod to the claims it mounts, looking them up
//! in the claim cache. Both handlers record a notice per lifecycle change.

use crate::recorder::{Notice, Recorder};
use informer::{EventHandler, ObjectKey, Store};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Names of the claims a pod mounts, in volume order.
pub fn claim_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.volumes.iter().flatten())
        .filter_map(|volume| volume.persistent_volume_claim.as_ref())
        .map(|source| source.claim_name.clone())
        .collect()
}

fn key_of<K: kube::Resource>(obj: &K) -> ObjectKey {
    ObjectKey::for_object(obj).unwrap_or_else(|| ObjectKey::new(None, obj.name_any()))
}

/// Handles pod lifecycle events.
pub struct PodHandler {
    claims: Store<PersistentVolumeClaim>,
    recorder: Arc<dyn Recorder>,
}

impl PodHandler {
    /// Creates a handler resolving claims against `claims`.
    pub fn new(claims: Store<PersistentVolumeClaim>, recorder: Arc<dyn Recorder>) -> Self {
        Self { claims, recorder }
    }

    /// Describes the claims of `pod` and whether each one is cached.
    fn describe_claims(&self, pod: &Pod) -> String {
        let names = claim_names(pod);
        if names.is_empty() {
            return "no claims".to_string();
        }
        let namespace = pod.namespace();
        names
            .iter()
            .map(|name| {
                let key = ObjectKey::new(namespace.as_deref(), name.as_str());
                if self.claims.contains(&key) {
                    format!("{name} (bound in cache)")
                } else {
                    format!("{name} (not cached)")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl EventHandler<Pod> for PodHandler {
    fn on_add(&self, pod: &Pod) -> anyhow::Result<()> {
        let key = key_of(pod);
        let claims = self.describe_claims(pod);
        info!(pod = %key, "Pod added, claims: {}", claims);
        self.recorder
            .record(Notice::new(key, "Pod", "Added", format!("pod added, claims: {claims}")));
        Ok(())
    }

    fn on_update(&self, old: &Pod, new: &Pod) -> anyhow::Result<()> {
        let key = key_of(new);
        let before = claim_names(old);
        let after = claim_names(new);
        if before == after {
            debug!(pod = %key, "Pod updated, claims unchanged");
            return Ok(());
        }
        let claims = self.describe_claims(new);
        info!(pod = %key, "Pod claims changed: {:?} -> {}", before, claims);
        self.recorder.record(Notice::new(
            key,
            "Pod",
            "ClaimsChanged",
            format!("pod claims changed, now: {claims}"),
        ));
        Ok(())
    }

    fn on_delete(&self, pod: &Pod) -> anyhow::Result<()> {
        let key = key_of(pod);
        let names = claim_names(pod);
        info!(pod = %key, "Pod deleted, released claims: {:?}", names);
        self.recorder.record(Notice::new(
            key,
            "Pod",
            "Deleted",
            format!("pod deleted, released claims: {}", names.join(", ")),
        ));
        Ok(())
    }
}

/// Handles PersistentVolumeClaim lifecycle events.
pub struct ClaimHandler {
    recorder: Arc<dyn Recorder>,
}

impl ClaimHandler {
    /// Creates a handler reporting to `recorder`.
    pub fn new(recorder: Arc<dyn Recorder>) -> Self {
        Self { recorder }
    }
}

fn claim_phase(claim: &PersistentVolumeClaim) -> &str {
    claim
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or("Unknown")
}

impl EventHandler<PersistentVolumeClaim> for ClaimHandler {
    fn on_add(&self, claim: &PersistentVolumeClaim) -> anyhow::Result<()> {
        let key = key_of(claim);
        let phase = claim_phase(claim);
        info!(claim = %key, phase, "PersistentVolumeClaim added");
        self.recorder.record(Notice::new(
            key,
            "PersistentVolumeClaim",
            "Added",
            format!("claim added in phase {phase}"),
        ));
        Ok(())
    }

    fn on_update(
        &self,
        old: &PersistentVolumeClaim,
        new: &PersistentVolumeClaim,
    ) -> anyhow::Result<()> {
        let key = key_of(new);
        let (before, after) = (claim_phase(old), claim_phase(new));
        if before == after {
            debug!(claim = %key, phase = after, "PersistentVolumeClaim updated");
            return Ok(());
        }
        info!(claim = %key, "PersistentVolumeClaim phase {} -> {}", before, after);
        self.recorder.record(Notice::new(
            key,
            "PersistentVolumeClaim",
            "PhaseChanged",
            format!("claim phase changed from {before} to {after}"),
        ));
        Ok(())
    }

    fn on_delete(&self, claim: &PersistentVolumeClaim) -> anyhow::Result<()> {
        let key = key_of(claim);
        info!(claim = %key, "PersistentVolumeClaim deleted");
        self.recorder.record(Notice::new(
            key,
            "PersistentVolumeClaim",
            "Deleted",
            "claim deleted",
        ));
        Ok(())
    }
}
