//! Controller-specific error types.
//!
//! Only construction can fail; once running, transport problems are retried
//! inside the informers and never reach the caller.

use informer::InformerError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur while setting up the Pod Volume Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Kubeconfig or in-cluster configuration could not be loaded
    #[error("Kubernetes configuration error: {0}")]
    KubeConfig(String),

    /// Informer construction failed
    #[error("Informer error: {0}")]
    Informer(#[from] InformerError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
