//! Workflow event envelope and the dispatcher seam.
//!
//! `thela.workflow.event.v1` is the minimal expressive envelope: every
//! successful allocator/lifecycle mutation emits one event. Notification
//! delivery is out of scope; transports subscribe through `EventSink`.

use crate::jsonl::{JsonlError, append_record_to_path, read_records_from_path};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thela_core::{Actor, ActorRole, PrepStatus, RefillStatus};
use tracing::{error, info};

pub const WORKFLOW_EVENT_SCHEMA: &str = "thela.workflow.event.v1";

fn default_workflow_event_schema() -> String {
    WORKFLOW_EVENT_SCHEMA.to_string()
}

/// What happened, tagged for consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkflowAction {
    AssignmentCreated {
        assignment_id: String,
        rider_id: String,
    },
    AssignmentCompleted {
        assignment_id: String,
    },
    AssignmentCancelled {
        assignment_id: String,
    },
    RefillCreated {
        request_id: String,
        rider_id: String,
        item_id: String,
        quantity: u32,
    },
    RefillTransitioned {
        request_id: String,
        from: RefillStatus,
        to: RefillStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinator_id: Option<String>,
    },
    PrepCreated {
        request_id: String,
        cook_id: String,
        quantity: u32,
    },
    PrepTransitioned {
        request_id: String,
        from: PrepStatus,
        to: PrepStatus,
    },
    PrepQuantityChanged {
        request_id: String,
        quantity: u32,
    },
}

impl WorkflowAction {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AssignmentCreated { .. } => "assignment.created",
            Self::AssignmentCompleted { .. } => "assignment.completed",
            Self::AssignmentCancelled { .. } => "assignment.cancelled",
            Self::RefillCreated { .. } => "refill.created",
            Self::RefillTransitioned { .. } => "refill.transitioned",
            Self::PrepCreated { .. } => "prep.created",
            Self::PrepTransitioned { .. } => "prep.transitioned",
            Self::PrepQuantityChanged { .. } => "prep.quantity_changed",
        }
    }

    /// Stable material for the event-id digest.
    fn digest_material(&self) -> String {
        match self {
            Self::AssignmentCreated {
                assignment_id,
                rider_id,
            } => format!("assignment.created:{assignment_id}:{rider_id}"),
            Self::AssignmentCompleted { assignment_id } => {
                format!("assignment.completed:{assignment_id}")
            }
            Self::AssignmentCancelled { assignment_id } => {
                format!("assignment.cancelled:{assignment_id}")
            }
            Self::RefillCreated {
                request_id,
                rider_id,
                item_id,
                quantity,
            } => format!("refill.created:{request_id}:{rider_id}:{item_id}:{quantity}"),
            Self::RefillTransitioned {
                request_id,
                from,
                to,
                coordinator_id,
            } => format!(
                "refill.transitioned:{request_id}:{from}:{to}:{}",
                coordinator_id.as_deref().unwrap_or("")
            ),
            Self::PrepCreated {
                request_id,
                cook_id,
                quantity,
            } => format!("prep.created:{request_id}:{cook_id}:{quantity}"),
            Self::PrepTransitioned {
                request_id,
                from,
                to,
            } => format!("prep.transitioned:{request_id}:{from}:{to}"),
            Self::PrepQuantityChanged {
                request_id,
                quantity,
            } => format!("prep.quantity_changed:{request_id}:{quantity}"),
        }
    }
}

/// One emitted workflow event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    #[serde(default = "default_workflow_event_schema")]
    pub schema: String,
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: String,
    pub actor_role: ActorRole,
    #[serde(flatten)]
    pub action: WorkflowAction,
}

impl WorkflowEvent {
    /// Build an event for `action` as performed by `actor` now.
    pub fn record(actor: &Actor, action: WorkflowAction) -> Self {
        let occurred_at = Utc::now();
        let event_id = event_digest_id(&actor.id, occurred_at, &action);
        Self {
            schema: WORKFLOW_EVENT_SCHEMA.to_string(),
            event_id,
            occurred_at,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            action,
        }
    }
}

/// Deterministic de-duplication key: digest of actor, time, and action.
fn event_digest_id(actor_id: &str, occurred_at: DateTime<Utc>, action: &WorkflowAction) -> String {
    let mut hasher = Sha256::new();
    hasher.update(actor_id.as_bytes());
    hasher.update(b"|");
    hasher.update(occurred_at.to_rfc3339().as_bytes());
    hasher.update(b"|");
    hasher.update(action.digest_material().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("evt1_{hex}")
}

/// Where successful mutations publish their events.
///
/// This is the notification-dispatcher seam: the workflow only emits; what
/// a transport does with the event is outside this repository.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &WorkflowEvent);
}

/// In-memory event log, optionally journaled to JSONL.
///
/// Journal append failures are logged and dropped: losing a notification
/// must not fail the mutation that produced it.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<WorkflowEvent>>,
    journal: Option<PathBuf>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(path: impl Into<PathBuf>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            journal: Some(path.into()),
        }
    }

    /// Snapshot all published events in publication order.
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: &WorkflowEvent) {
        info!(
            event_id = %event.event_id,
            kind = event.action.kind(),
            actor = %event.actor_id,
            "workflow event"
        );
        if let Some(path) = &self.journal
            && let Err(err) = append_record_to_path(path, event)
        {
            error!(path = %path.display(), %err, "failed to journal workflow event");
        }
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event.clone());
    }
}

/// Read a journaled event stream back.
pub fn read_events_from_journal(path: impl AsRef<Path>) -> Result<Vec<WorkflowEvent>, JsonlError> {
    read_records_from_path(path)
}
