//! Canonical in-memory state for refill and prep requests.
//!
//! Each request sits behind its own lock so lifecycle transitions can
//! check-then-set atomically per request id. Consumed prep requests leave a
//! tombstone behind: later calls on a consumed id answer "already terminal",
//! not "never existed".

use crate::jsonl::{JsonlError, read_records_from_path, write_records_to_path};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use thela_core::{PrepRequest, RefillRequest};

/// Errors raised by request store lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request not found: {0}")]
    NotFound(String),
}

/// Refill and prep request state, keyed by request id.
#[derive(Debug, Default)]
pub struct RequestStore {
    refills: RwLock<BTreeMap<String, Arc<Mutex<RefillRequest>>>>,
    preps: RwLock<BTreeMap<String, Arc<Mutex<PrepRequest>>>>,
    consumed_preps: RwLock<BTreeSet<String>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_refill(&self, request: RefillRequest) {
        let mut refills = self.refills.write().unwrap_or_else(|e| e.into_inner());
        refills.insert(request.id.clone(), Arc::new(Mutex::new(request)));
    }

    pub fn insert_prep(&self, request: PrepRequest) {
        let mut preps = self.preps.write().unwrap_or_else(|e| e.into_inner());
        preps.insert(request.id.clone(), Arc::new(Mutex::new(request)));
    }

    /// Snapshot one refill request.
    pub fn refill(&self, request_id: &str) -> Option<RefillRequest> {
        let entry = self.refill_entry(request_id)?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(entry.clone())
    }

    /// Snapshot one prep request.
    pub fn prep(&self, request_id: &str) -> Option<PrepRequest> {
        let entry = self.prep_entry(request_id)?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(entry.clone())
    }

    /// The lock holding one refill request, for check-then-set transitions.
    pub fn refill_entry(&self, request_id: &str) -> Option<Arc<Mutex<RefillRequest>>> {
        let refills = self.refills.read().unwrap_or_else(|e| e.into_inner());
        refills.get(request_id).cloned()
    }

    /// The lock holding one prep request, for check-then-set transitions.
    pub fn prep_entry(&self, request_id: &str) -> Option<Arc<Mutex<PrepRequest>>> {
        let preps = self.preps.read().unwrap_or_else(|e| e.into_inner());
        preps.get(request_id).cloned()
    }

    /// Snapshot all refill requests in deterministic id order.
    pub fn refills(&self) -> Vec<RefillRequest> {
        let refills = self.refills.read().unwrap_or_else(|e| e.into_inner());
        refills
            .values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Snapshot all active prep requests in deterministic id order.
    pub fn preps(&self) -> Vec<PrepRequest> {
        let preps = self.preps.read().unwrap_or_else(|e| e.into_inner());
        preps
            .values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .collect()
    }

    /// Remove a prep request from the active set and tombstone its id.
    pub fn consume_prep(&self, request_id: &str) -> Result<PrepRequest, StoreError> {
        let mut preps = self.preps.write().unwrap_or_else(|e| e.into_inner());
        let entry = preps
            .remove(request_id)
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        let consumed = entry.lock().unwrap_or_else(|e| e.into_inner()).clone();
        drop(preps);

        let mut tombstones = self.consumed_preps.write().unwrap_or_else(|e| e.into_inner());
        tombstones.insert(request_id.to_string());
        Ok(consumed)
    }

    /// Whether a prep id was consumed by a `picked` transition.
    pub fn is_prep_consumed(&self, request_id: &str) -> bool {
        let tombstones = self.consumed_preps.read().unwrap_or_else(|e| e.into_inner());
        tombstones.contains(request_id)
    }

    /// Hydrate from JSONL snapshots. Later lines win on duplicate ids.
    pub fn load_jsonl(
        refills_path: impl AsRef<Path>,
        preps_path: impl AsRef<Path>,
    ) -> Result<Self, JsonlError> {
        let store = Self::new();
        for record in read_records_from_path::<RefillRequest>(refills_path)? {
            store.insert_refill(record);
        }
        for record in read_records_from_path::<PrepRequest>(preps_path)? {
            store.insert_prep(record);
        }
        Ok(store)
    }

    /// Flush both request sets to JSONL snapshots.
    pub fn save_jsonl(
        &self,
        refills_path: impl AsRef<Path>,
        preps_path: impl AsRef<Path>,
    ) -> Result<(), JsonlError> {
        write_records_to_path(refills_path, &self.refills())?;
        write_records_to_path(preps_path, &self.preps())
    }
}
