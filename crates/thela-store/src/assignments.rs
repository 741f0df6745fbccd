//! Canonical in-memory state for assignments.

use crate::jsonl::{JsonlError, read_records_from_path, write_records_to_path};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use thela_core::Assignment;

/// Assignment records keyed by id, each behind its own lock so completion
/// and cancellation can check-then-set atomically.
#[derive(Debug, Default)]
pub struct AssignmentStore {
    assignments: RwLock<BTreeMap<String, Arc<Mutex<Assignment>>>>,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, assignment: Assignment) {
        let mut assignments = self.assignments.write().unwrap_or_else(|e| e.into_inner());
        assignments.insert(assignment.id.clone(), Arc::new(Mutex::new(assignment)));
    }

    /// Snapshot one assignment.
    pub fn assignment(&self, assignment_id: &str) -> Option<Assignment> {
        let entry = self.entry(assignment_id)?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(entry.clone())
    }

    /// The lock holding one assignment.
    pub fn entry(&self, assignment_id: &str) -> Option<Arc<Mutex<Assignment>>> {
        let assignments = self.assignments.read().unwrap_or_else(|e| e.into_inner());
        assignments.get(assignment_id).cloned()
    }

    /// Snapshot all assignments in deterministic id order.
    pub fn list(&self) -> Vec<Assignment> {
        let assignments = self.assignments.read().unwrap_or_else(|e| e.into_inner());
        assignments
            .values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Hydrate from a JSONL snapshot. Later lines win on duplicate ids.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let store = Self::new();
        for record in read_records_from_path::<Assignment>(path)? {
            store.insert(record);
        }
        Ok(store)
    }

    /// Flush all assignments to a JSONL snapshot.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), JsonlError> {
        write_records_to_path(path, &self.list())
    }
}
