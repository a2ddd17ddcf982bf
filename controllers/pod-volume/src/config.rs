//! Controller configuration.
//!
//! Loaded from environment variables:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `WATCH_NAMESPACE` | all namespaces | Namespace to watch |
//! | `KUBE_MASTER_URL` | inferred | API server URL override |
//! | `RESYNC_PERIOD_SECS` | `5` | Resync period, `0` disables |
//! | `SHUTDOWN_GRACE_SECS` | `10` | Bound on shutdown |
//! | `RELIST_BACKOFF_MIN_MS` | `1000` | First retry delay |
//! | `RELIST_BACKOFF_MAX_MS` | `30000` | Retry delay cap |
//! | `HOSTNAME` | none | Suffix of the notice source name |
//!
//! Credentials come from `KUBECONFIG` or the in-cluster service account.

use crate::error::ControllerError;
use informer::InformerConfig;
use kube::Client;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Component name used as the source of recorded notices.
pub const COMPONENT: &str = "pod-volume-controller";

/// Runtime configuration of the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace scope; `None` watches all namespaces
    pub namespace: Option<String>,
    /// API server URL overriding the inferred one
    pub master_url: Option<String>,
    /// Informer tuning
    pub informer: InformerConfig,
    /// How long `run` waits for informers after the stop signal
    pub shutdown_grace: Duration,
    /// Host the controller runs on
    pub hostname: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            master_url: None,
            informer: InformerConfig::default(),
            shutdown_grace: Duration::from_secs(10),
            hostname: None,
        }
    }
}

impl ControllerConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, which returns the value of a
    /// variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let namespace = non_empty("WATCH_NAMESPACE").map(|ns| ns.trim().to_string());
        if let Some(ns) = &namespace {
            validate_namespace(ns)?;
        }

        let resync_period = match non_empty("RESYNC_PERIOD_SECS") {
            Some(v) => Duration::from_secs(parse("RESYNC_PERIOD_SECS", &v)?),
            None => defaults.informer.resync_period,
        };
        let shutdown_grace = match non_empty("SHUTDOWN_GRACE_SECS") {
            Some(v) => Duration::from_secs(parse("SHUTDOWN_GRACE_SECS", &v)?),
            None => defaults.shutdown_grace,
        };
        let backoff_min = match non_empty("RELIST_BACKOFF_MIN_MS") {
            Some(v) => Duration::from_millis(parse("RELIST_BACKOFF_MIN_MS", &v)?),
            None => defaults.informer.backoff_min,
        };
        let backoff_max = match non_empty("RELIST_BACKOFF_MAX_MS") {
            Some(v) => Duration::from_millis(parse("RELIST_BACKOFF_MAX_MS", &v)?),
            None => defaults.informer.backoff_max,
        };

        let informer = InformerConfig {
            resync_period,
            backoff_min,
            backoff_max,
        };
        informer.validate()?;

        Ok(Self {
            namespace,
            master_url: non_empty("KUBE_MASTER_URL"),
            informer,
            shutdown_grace,
            hostname: non_empty("HOSTNAME").map(|h| h.trim().to_string()),
        })
    }

    /// Name of the notice source: the component, suffixed with the host when known.
    pub fn component(&self) -> String {
        match &self.hostname {
            Some(host) => format!("{COMPONENT}-{host}"),
            None => COMPONENT.to_string(),
        }
    }

    /// Builds a Kubernetes client from the inferred kubeconfig or in-cluster
    /// configuration, pointing it at `master_url` when set.
    pub async fn kube_client(&self) -> Result<Client, ControllerError> {
        let mut config = kube::Config::infer()
            .await
            .map_err(|e| ControllerError::KubeConfig(e.to_string()))?;
        if let Some(url) = &self.master_url {
            config.cluster_url = url.parse().map_err(|e| {
                ControllerError::InvalidConfig(format!("invalid KUBE_MASTER_URL {url}: {e}"))
            })?;
        }
        Ok(Client::try_from(config)?)
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T, ControllerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("{name}={value}: {e}")))
}

/// Namespace names are DNS-1123 labels.
fn validate_namespace(ns: &str) -> Result<(), ControllerError> {
    let valid = ns.len() <= 63
        && ns
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !ns.starts_with('-')
        && !ns.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(ControllerError::InvalidConfig(format!(
            "WATCH_NAMESPACE {ns:?} is not a valid namespace name"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ControllerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).expect("defaults are valid");
        assert!(config.namespace.is_none());
        assert!(config.master_url.is_none());
        assert_eq!(config.informer.resync_period, Duration::from_secs(5));
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.component(), "pod-volume-controller");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WATCH_NAMESPACE", "storage"),
            ("KUBE_MASTER_URL", "https://10.0.0.1:6443"),
            ("RESYNC_PERIOD_SECS", "0"),
            ("SHUTDOWN_GRACE_SECS", "3"),
            ("RELIST_BACKOFF_MIN_MS", "200"),
            ("RELIST_BACKOFF_MAX_MS", "5000"),
            ("HOSTNAME", "node-7"),
        ])
        .expect("valid overrides");
        assert_eq!(config.namespace.as_deref(), Some("storage"));
        assert_eq!(config.master_url.as_deref(), Some("https://10.0.0.1:6443"));
        assert!(config.informer.resync_period.is_zero());
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.informer.backoff_min, Duration::from_millis(200));
        assert_eq!(config.informer.backoff_max, Duration::from_millis(5000));
        assert_eq!(config.component(), "pod-volume-controller-node-7");
    }

    #[test]
    fn test_empty_namespace_means_all() {
        let config = load(&[("WATCH_NAMESPACE", "  ")]).expect("blank namespace is allowed");
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            load(&[("WATCH_NAMESPACE", "Not_Valid")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("RESYNC_PERIOD_SECS", "five")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            load(&[("RELIST_BACKOFF_MIN_MS", "0")]),
            Err(ControllerError::Informer(_))
        ));
        assert!(matches!(
            load(&[("RELIST_BACKOFF_MIN_MS", "9000"), ("RELIST_BACKOFF_MAX_MS", "100")]),
            Err(ControllerError::Informer(_))
        ));
    }
}
