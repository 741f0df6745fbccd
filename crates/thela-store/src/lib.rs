//! # thela-store
//!
//! Authoritative state for the thela workflow.
//!
//! This crate provides:
//! - `InventoryLedger`: per-item stock counters with atomic reserve/release
//! - `ResourceRegistry`: availability state for allocatable assets
//! - `RequestStore` / `AssignmentStore`: workflow records behind per-entry locks
//! - `ComboCatalog`: menu bundles expanded at allocation time
//! - `EventLog` / `EventSink`: the workflow event envelope and dispatcher seam
//! - JSONL snapshot persistence (portable, one record per line)
//!
//! It intentionally does not orchestrate: the two-phase allocation protocol
//! and the role-gated lifecycle live in `thela-flow`.
//!
//! ## Data model
//!
//! ```text
//! JSONL snapshots (on disk, one line per record)
//!     ↕  hydrate / flush
//! per-id locked entries (authoritative in-memory state)
//! ```

pub mod assignments;
pub mod catalog;
pub mod events;
pub mod jsonl;
pub mod ledger;
pub mod registry;
pub mod requests;

pub use assignments::AssignmentStore;
pub use catalog::{CatalogError, ComboCatalog};
pub use events::{
    EventLog, EventSink, WORKFLOW_EVENT_SCHEMA, WorkflowAction, WorkflowEvent,
    read_events_from_journal,
};
pub use jsonl::{
    JsonlError, append_record_to_path, read_records, read_records_from_path, write_records,
    write_records_to_path,
};
pub use ledger::{InventoryLedger, LedgerError, LedgerRecord};
pub use registry::{RegistryError, ResourceRegistry};
pub use requests::{RequestStore, StoreError};
