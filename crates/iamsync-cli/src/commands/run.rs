//! Reconciling declarations against an in-memory policy backend

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use iamsync_reconciler::{
    cancel_pair, DeclarationStore, InMemoryPolicyTransport, ManagedResource, ReconcileSummary,
    Reconciler, ReconcilerConfig, ResourceStatus,
};
use iamsync_types::{PolicyDocument, ResourceId};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::input::read_file;
use crate::output::{print_single, OutputFormat};

/// Arguments for `iamsync run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Declarations file: a list of managed resources (JSON or YAML)
    #[arg(short, long)]
    pub declarations: PathBuf,

    /// Policies file: a map of bucket name to policy document (JSON or YAML)
    #[arg(short, long)]
    pub policies: Option<PathBuf>,

    /// Run a single pass instead of looping until interrupted
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ReconcileSummary>,
    statuses: BTreeMap<String, ResourceStatus>,
    policies: BTreeMap<String, PolicyDocument>,
}

/// Seed the backend, reconcile, then print the resulting state
pub async fn execute(
    args: RunArgs,
    config: ReconcilerConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let declarations: Vec<ManagedResource> = read_file(&args.declarations)?;
    let seeded: BTreeMap<String, PolicyDocument> = match &args.policies {
        Some(path) => read_file(path)?,
        None => BTreeMap::new(),
    };

    let transport = Arc::new(InMemoryPolicyTransport::new());
    let mut buckets = BTreeSet::new();
    for (bucket, policy) in seeded {
        let id = ResourceId::new(bucket).context("invalid bucket name in policies file")?;
        transport.insert_policy(id.clone(), policy).await;
        buckets.insert(id);
    }

    // Declared buckets exist with an empty policy unless seeded.
    let store = Arc::new(DeclarationStore::new());
    for mg in declarations {
        if let ManagedResource::BucketPolicyMember(member) = &mg {
            transport.insert_resource(member.bucket.clone()).await;
            buckets.insert(member.bucket.clone());
        }
        store.upsert(mg).await;
    }
    tracing::info!(
        declarations = store.len().await,
        buckets = buckets.len(),
        "Seeded reconciler"
    );

    let (event_tx, _) = broadcast::channel(256);
    let (cancel_handle, cancel) = cancel_pair();
    let (reconciler, trigger_rx) =
        Reconciler::new(config, store.clone(), transport.clone(), event_tx, cancel);

    let summary = if args.once {
        Some(reconciler.reconcile_all().await)
    } else {
        let mut events = reconciler.subscribe();
        let handle = tokio::spawn(reconciler.clone().start(trigger_rx));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(envelope) => tracing::debug!(event = ?envelope.event, "Reconcile event"),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        tracing::info!("Shutting down reconciler");
        cancel_handle.cancel();
        handle.await.context("reconciler task failed")?;
        None
    };

    let mut statuses = BTreeMap::new();
    for name in store.names().await {
        if let Some(status) = store.status(&name).await {
            statuses.insert(name, status);
        }
    }

    let mut policies = BTreeMap::new();
    for id in buckets {
        if let Some(policy) = transport.policy(&id).await {
            policies.insert(id.to_string(), policy);
        }
    }

    print_single(
        &RunReport {
            summary,
            statuses,
            policies,
        },
        format,
    )
}
