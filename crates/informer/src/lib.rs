//! List+watch cache engine
//!
//! Keeps a local, continuously resynchronized cache of one Kubernetes
//! resource kind and dispatches typed add/update/delete notifications.
//!
//! # Example
//!
//! ```no_run
//! use informer::{HandlerFuncs, Informer, InformerConfig, KubeListerWatcher, Selector};
//! use k8s_openapi::api::core::v1::Pod;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let source = KubeListerWatcher::<Pod>::new(client, Some("default"), Selector::default());
//! let handler = HandlerFuncs::new().with_add(|pod: &Pod| {
//!     println!("added {:?}", pod.metadata.name);
//!     Ok(())
//! });
//!
//! let informer = Informer::new("Pod", Arc::new(source), Arc::new(handler), &InformerConfig::default())?;
//! let pods = informer.store();
//! let shutdown = CancellationToken::new();
//! tokio::spawn(informer.run(shutdown.clone()));
//!
//! println!("{} pods cached", pods.len());
//! shutdown.cancel();
//! # Ok(())
//! # }
//! ```
//!
//! # Guarantees
//!
//! - Events of one kind are applied and dispatched one at a time, in stream order
//! - A duplicate delivery neither changes the cache nor dispatches
//! - After any stream interruption the cache is reconciled against a fresh listing
//! - Resync redelivers cached objects without touching the cache or the cursor
//! - A failing or panicking handler never stops the session

pub mod backoff;
pub mod error;
pub mod handler;
pub mod informer;
pub mod kube_source;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod object;
pub mod resync;
pub mod session;
pub mod source;
pub mod store;

pub use backoff::FibonacciBackoff;
pub use error::InformerError;
pub use handler::{EventHandler, HandlerFuncs};
pub use informer::{Informer, InformerConfig};
pub use kube_source::{KubeListerWatcher, Selector};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockListerWatcher;
pub use object::{ObjectKey, Tracked};
pub use session::{SessionPhase, SessionStatus, WatchSession};
pub use source::{ListerWatcher, Listing, WatchEvent, WatchStream};
pub use store::{Store, Writer};
