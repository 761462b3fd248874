//! Reconciliation events published to the host

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Phase;

/// Something the reconciler did or noticed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcileEvent {
    Observed {
        name: String,
        exists: bool,
        up_to_date: bool,
    },
    Created {
        name: String,
        resource: String,
    },
    Updated {
        name: String,
        resource: String,
    },
    Deleted {
        name: String,
        resource: String,
    },
    ReconcileFailed {
        name: String,
        phase: Phase,
        reason: String,
    },
    /// Still not up to date after repeated update passes
    ConvergenceStalled {
        name: String,
        passes: u32,
    },
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl ReconcileEvent {
    pub fn severity(&self) -> EventSeverity {
        match self {
            ReconcileEvent::Observed { .. } => EventSeverity::Debug,
            ReconcileEvent::Created { .. }
            | ReconcileEvent::Updated { .. }
            | ReconcileEvent::Deleted { .. } => EventSeverity::Info,
            ReconcileEvent::ConvergenceStalled { .. } => EventSeverity::Warning,
            ReconcileEvent::ReconcileFailed { .. } => EventSeverity::Error,
        }
    }
}

/// Envelope carrying an event on the broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    pub severity: EventSeverity,

    pub event: ReconcileEvent,
}

impl ReconcileEventEnvelope {
    pub fn new(event: ReconcileEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity: event.severity(),
            event,
        }
    }
}
