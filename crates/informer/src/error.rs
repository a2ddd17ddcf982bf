//! Informer errors

use thiserror::Error;

/// Errors that can occur while listing or watching a resource collection
#[derive(Debug, Error)]
pub enum InformerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Connectivity or request failure not raised by the kube client
    #[error("Transport error: {0}")]
    Transport(String),

    /// The watch stream reported an error event
    #[error("Watch stream error: {0}")]
    Watch(String),

    /// Invalid informer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
