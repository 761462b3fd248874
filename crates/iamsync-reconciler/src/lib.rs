//! # iamsync Reconciler
//!
//! Drives a declared role/member binding on a remote resource's IAM policy
//! to convergence through four phases:
//!
//! - **Observe**: fetch the policy and classify it as non-existent, up to
//!   date, or not up to date. Never writes.
//! - **Create**: write a fresh policy holding only the desired binding.
//! - **Update**: re-fetch, re-check, correct and write back the whole
//!   document.
//! - **Delete**: replace the policy with an empty one.
//!
//! Every phase issues at most one write, takes a [`CancelSignal`] that
//! aborts the in-flight remote call, and returns errors with phase context
//! to the caller. The [`Reconciler`] host loop owns scheduling, retry
//! backoff, status reporting and stall detection on top of the phases.
//!
//! ## Key Components
//!
//! - [`PolicyTransport`]: Seam to the remote policy API
//! - [`PolicyMemberExternal`]: The four-phase driver
//! - [`Reconciler`]: Interval/trigger driven loop over a [`DeclarationStore`]
//! - [`InMemoryPolicyTransport`]: Transport for development and tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iamsync_reconciler::{
//!     BucketPolicyMember, CancelSignal, DeclarationStore, InMemoryPolicyTransport, Reconciler,
//!     ReconcilerConfig,
//! };
//! use iamsync_types::{DesiredBindingSpec, ResourceId};
//!
//! # async fn example() {
//! let store = Arc::new(DeclarationStore::new());
//! let bucket = ResourceId::new("assets").unwrap();
//! store
//!     .upsert(
//!         BucketPolicyMember::new(
//!             "public-read",
//!             bucket,
//!             DesiredBindingSpec::present("roles/storage.objectViewer", "allUsers"),
//!         )
//!         .into(),
//!     )
//!     .await;
//!
//! let (event_tx, _) = tokio::sync::broadcast::channel(100);
//! let (reconciler, trigger_rx) = Reconciler::new(
//!     ReconcilerConfig::default(),
//!     store,
//!     Arc::new(InMemoryPolicyTransport::new()),
//!     event_tx,
//!     CancelSignal::never(),
//! );
//! reconciler.start(trigger_rx).await;
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod backoff;
pub mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod external;
pub mod memory;
pub mod reconciler;
pub mod resource;
pub mod store;
pub mod transport;

// Re-exports
pub use backoff::RetryTracker;
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::{BackoffConfig, LoggingConfig, ReconcilerConfig};
pub use error::{Phase, ReconcileError, Result, TransportError};
pub use events::{EventSeverity, ReconcileEvent, ReconcileEventEnvelope};
pub use external::{Observation, ObservedState, PolicyMemberExternal, UpdateOutcome};
pub use memory::InMemoryPolicyTransport;
pub use reconciler::{PassOutcome, ReconcileSummary, Reconciler};
pub use resource::{
    BucketPolicyMember, ForeignResource, ManagedResource, Readiness, ResourceStatus, SyncState,
};
pub use store::DeclarationStore;
pub use transport::{PolicyTransport, TransportResult};
