//! The workflow aggregate: every store behind one handle.
//!
//! One `Workflow` is the server-side authority for a deployment. Operations
//! never take a global lock; they touch only the entries named in the call.

use std::path::Path;
use std::sync::Arc;
use thela_core::Actor;
use thela_store::{
    AssignmentStore, ComboCatalog, EventLog, EventSink, InventoryLedger, JsonlError, RequestStore,
    ResourceRegistry, WorkflowAction, WorkflowEvent,
};

/// Snapshot file names under the data directory.
pub mod snapshot {
    pub const FOODS: &str = "foods.jsonl";
    pub const RESOURCES: &str = "resources.jsonl";
    pub const COMBOS: &str = "combos.jsonl";
    pub const REFILL_REQUESTS: &str = "refill-requests.jsonl";
    pub const PREP_REQUESTS: &str = "prep-requests.jsonl";
    pub const ASSIGNMENTS: &str = "assignments.jsonl";
    pub const EVENTS: &str = "events.jsonl";
}

/// Shared state and the event seam for one deployment.
pub struct Workflow {
    ledger: Arc<InventoryLedger>,
    registry: Arc<ResourceRegistry>,
    catalog: Arc<ComboCatalog>,
    requests: Arc<RequestStore>,
    assignments: Arc<AssignmentStore>,
    events: Arc<dyn EventSink>,
}

impl Workflow {
    /// An empty workflow publishing into `events`.
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            ledger: Arc::new(InventoryLedger::new()),
            registry: Arc::new(ResourceRegistry::new()),
            catalog: Arc::new(ComboCatalog::new()),
            requests: Arc::new(RequestStore::new()),
            assignments: Arc::new(AssignmentStore::new()),
            events,
        }
    }

    /// An empty workflow with an in-memory event log (tests, demos).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(EventLog::new()))
    }

    /// Hydrate every store from JSONL snapshots under `data_dir`.
    ///
    /// Missing files hydrate as empty stores. Events journal to
    /// `events.jsonl` in the same directory.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let dir = data_dir.as_ref();
        Ok(Self {
            ledger: Arc::new(InventoryLedger::load_jsonl(dir.join(snapshot::FOODS))?),
            registry: Arc::new(ResourceRegistry::load_jsonl(dir.join(snapshot::RESOURCES))?),
            catalog: Arc::new(ComboCatalog::load_jsonl(dir.join(snapshot::COMBOS))?),
            requests: Arc::new(RequestStore::load_jsonl(
                dir.join(snapshot::REFILL_REQUESTS),
                dir.join(snapshot::PREP_REQUESTS),
            )?),
            assignments: Arc::new(AssignmentStore::load_jsonl(
                dir.join(snapshot::ASSIGNMENTS),
            )?),
            events: Arc::new(EventLog::with_journal(dir.join(snapshot::EVENTS))),
        })
    }

    /// Flush every store to JSONL snapshots under `data_dir`.
    pub fn save(&self, data_dir: impl AsRef<Path>) -> Result<(), JsonlError> {
        let dir = data_dir.as_ref();
        self.ledger.save_jsonl(dir.join(snapshot::FOODS))?;
        self.registry.save_jsonl(dir.join(snapshot::RESOURCES))?;
        self.catalog.save_jsonl(dir.join(snapshot::COMBOS))?;
        self.requests.save_jsonl(
            dir.join(snapshot::REFILL_REQUESTS),
            dir.join(snapshot::PREP_REQUESTS),
        )?;
        self.assignments.save_jsonl(dir.join(snapshot::ASSIGNMENTS))
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ComboCatalog {
        &self.catalog
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn assignments(&self) -> &AssignmentStore {
        &self.assignments
    }

    pub(crate) fn publish(&self, actor: &Actor, action: WorkflowAction) {
        self.events.publish(&WorkflowEvent::record(actor, action));
    }
}
