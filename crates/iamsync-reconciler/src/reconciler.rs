//! Reconciliation loop
//!
//! The host side of the driver: walks every registered declaration on each
//! tick, runs observe and at most one corrective phase, and records status,
//! backoff and stall state between passes.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use iamsync_types::Ensure;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::time::{interval, Duration, Instant};

use crate::backoff::RetryTracker;
use crate::cancel::CancelSignal;
use crate::config::ReconcilerConfig;
use crate::error::{Phase, Result};
use crate::events::{ReconcileEvent, ReconcileEventEnvelope};
use crate::external::{ObservedState, PolicyMemberExternal, UpdateOutcome};
use crate::resource::{ManagedResource, SyncState};
use crate::store::DeclarationStore;
use crate::transport::PolicyTransport;

/// What a single pass over one declaration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Remote state already satisfied the declaration
    Converged,
    Created,
    Updated,
    /// Remote policy cleared and the declaration dropped
    Deleted,
    /// Skipped: a previous failure's backoff has not elapsed
    BackingOff,
    /// Skipped: the declaration is reconciled by another controller
    NotOwned,
    /// Skipped: the declaration disappeared from the store
    Missing,
}

/// Per-tick totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub converged: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ReconcileSummary {
    fn record(&mut self, result: &Result<PassOutcome>) {
        match result {
            Ok(PassOutcome::Converged) => self.converged += 1,
            Ok(PassOutcome::Created) => self.created += 1,
            Ok(PassOutcome::Updated) => self.updated += 1,
            Ok(PassOutcome::Deleted) => self.deleted += 1,
            Ok(PassOutcome::BackingOff | PassOutcome::NotOwned | PassOutcome::Missing) => {
                self.skipped += 1
            }
            Err(_) => self.failed += 1,
        }
    }
}

/// Reconciler state
pub struct Reconciler {
    config: ReconcilerConfig,
    store: Arc<DeclarationStore>,
    external: PolicyMemberExternal,
    event_tx: broadcast::Sender<ReconcileEventEnvelope>,
    trigger_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    retries: Mutex<RetryTracker>,
    stalls: Mutex<HashMap<String, u32>>,
    cancel: CancelSignal,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<DeclarationStore>,
        transport: Arc<dyn PolicyTransport>,
        event_tx: broadcast::Sender<ReconcileEventEnvelope>,
        cancel: CancelSignal,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(10);

        let reconciler = Arc::new(Self {
            external: PolicyMemberExternal::new(transport, config.policy_version),
            retries: Mutex::new(RetryTracker::new(config.backoff.clone())),
            stalls: Mutex::new(HashMap::new()),
            config,
            store,
            event_tx,
            trigger_tx,
            running: Arc::new(RwLock::new(false)),
            cancel,
        });

        (reconciler, trigger_rx)
    }

    /// Subscribe to reconciliation events
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Trigger an immediate reconciliation
    pub async fn trigger_reconcile(&self) {
        let _ = self.trigger_tx.send(()).await;
    }

    /// Run the reconciliation loop until stopped or cancelled
    pub async fn start(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(
            interval_secs = self.config.reconcile_interval_secs,
            "Reconciler started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.reconcile_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconcile_all().await;
                }
                Some(_) = trigger_rx.recv() => {
                    self.reconcile_all().await;
                }
                _ = self.cancel.cancelled() => break,
                else => break,
            }

            let running = self.running.read().await;
            if !*running {
                break;
            }
        }

        tracing::info!("Reconciler stopped");
    }

    /// Stop the loop after the current tick
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    /// Reconcile every declaration once, at most
    /// `max_concurrent_reconciliations` at a time
    pub async fn reconcile_all(&self) -> ReconcileSummary {
        let names = self.store.names().await;
        let limit = self.config.max_concurrent_reconciliations.max(1);

        let results: Vec<Result<PassOutcome>> = stream::iter(names)
            .map(|name| async move { self.reconcile_one(&name).await })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut summary = ReconcileSummary::default();
        for result in &results {
            summary.record(result);
        }

        tracing::debug!(?summary, "Reconciliation tick finished");
        summary
    }

    /// Reconcile a single declaration
    pub async fn reconcile_one(&self, name: &str) -> Result<PassOutcome> {
        let Some(mut mg) = self.store.get(name).await else {
            self.forget(name).await;
            return Ok(PassOutcome::Missing);
        };
        if !matches!(mg, ManagedResource::BucketPolicyMember(_)) {
            return Ok(PassOutcome::NotOwned);
        }

        if !self.retries.lock().await.is_due(name, Instant::now()) {
            tracing::trace!(declaration = %name, "Backing off");
            return Ok(PassOutcome::BackingOff);
        }

        let result = self.pass(name, &mut mg).await;

        match &result {
            Ok(_) => {
                self.retries.lock().await.record_success(name);
            }
            Err(e) => {
                let transient = e.is_transient();
                let (delay, failures) = {
                    let mut retries = self.retries.lock().await;
                    let now = Instant::now();
                    // Permanent errors wait the full cap.
                    let delay = if transient {
                        retries.record_failure(name, now)
                    } else {
                        retries.record_permanent_failure(name, now)
                    };
                    (delay, retries.failure_count(name))
                };
                tracing::error!(
                    declaration = %name,
                    phase = %e.phase(),
                    error = %e,
                    transient,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Failed to reconcile declaration"
                );
                if let Some(status) = mg.status_mut() {
                    status.set_sync(SyncState::Error {
                        message: e.to_string(),
                    });
                }
                self.emit(ReconcileEvent::ReconcileFailed {
                    name: name.to_string(),
                    phase: e.phase(),
                    reason: e.to_string(),
                });
            }
        }

        // A deleted declaration is already gone from the store.
        if !matches!(result, Ok(PassOutcome::Deleted)) {
            if let Some(status) = mg.status() {
                self.store.update_status(name, status.clone()).await;
            }
        }

        result
    }

    async fn pass(&self, name: &str, mg: &mut ManagedResource) -> Result<PassOutcome> {
        let observation = self.external.observe(mg, &self.cancel).await?;
        self.emit(ReconcileEvent::Observed {
            name: name.to_string(),
            exists: observation.resource_exists,
            up_to_date: observation.resource_up_to_date,
        });

        let resource = mg.policy_member(Phase::Observe)?.bucket.to_string();

        if mg.deletion_requested() {
            if observation.resource_exists {
                self.external.delete(mg, &self.cancel).await?;
                self.emit(ReconcileEvent::Deleted {
                    name: name.to_string(),
                    resource,
                });
            }
            self.store.remove(name).await;
            self.stalls.lock().await.remove(name);
            return Ok(PassOutcome::Deleted);
        }

        let outcome = match observation.state() {
            ObservedState::NonExistent => {
                if self.wants_absent(mg) {
                    PassOutcome::Converged
                } else {
                    self.external.create(mg, &self.cancel).await?;
                    self.emit(ReconcileEvent::Created {
                        name: name.to_string(),
                        resource,
                    });
                    PassOutcome::Created
                }
            }
            ObservedState::UpToDate => PassOutcome::Converged,
            ObservedState::NotUpToDate => match self.external.update(mg, &self.cancel).await? {
                UpdateOutcome::Written => {
                    self.emit(ReconcileEvent::Updated {
                        name: name.to_string(),
                        resource,
                    });
                    PassOutcome::Updated
                }
                UpdateOutcome::AlreadyConverged => PassOutcome::Converged,
            },
        };

        let corrected = matches!(outcome, PassOutcome::Created | PassOutcome::Updated);
        let sync = match self.track_convergence(name, corrected).await {
            Some(passes) => SyncState::Stalled { passes },
            None => SyncState::Synced,
        };
        if let Some(status) = mg.status_mut() {
            status.set_sync(sync);
        }

        Ok(outcome)
    }

    /// Count consecutive passes that had to rewrite the policy, by create or
    /// by update. Returns the count once it exceeds the stall threshold.
    async fn track_convergence(&self, name: &str, corrected: bool) -> Option<u32> {
        let mut stalls = self.stalls.lock().await;
        if !corrected {
            stalls.remove(name);
            return None;
        }

        let passes = stalls.entry(name.to_string()).or_insert(0);
        *passes += 1;
        if *passes <= self.config.stall_threshold {
            return None;
        }

        let passes = *passes;
        tracing::warn!(
            declaration = %name,
            passes,
            "Policy still not up to date after repeated updates"
        );
        self.emit(ReconcileEvent::ConvergenceStalled {
            name: name.to_string(),
            passes,
        });
        Some(passes)
    }

    /// Drop retry and stall state for a declaration no longer in the store
    async fn forget(&self, name: &str) {
        self.retries.lock().await.forget(name);
        self.stalls.lock().await.remove(name);
    }

    fn wants_absent(&self, mg: &ManagedResource) -> bool {
        matches!(mg, ManagedResource::BucketPolicyMember(m) if m.spec.ensure == Ensure::Absent)
    }

    fn emit(&self, event: ReconcileEvent) {
        let _ = self.event_tx.send(ReconcileEventEnvelope::new(event));
    }
}
