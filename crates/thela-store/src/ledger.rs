//! Inventory ledger: per-item stock counters with atomic reserve/release.
//!
//! Stock is mutated only here. Each item carries an `in_flight` balance —
//! units eligible to be released back into stock: outstanding reserves plus
//! registered inbound cart deliveries. A release that exceeds it is clamped
//! and logged, never fatal (spec'd defensive path).

use crate::jsonl::{JsonlError, read_records_from_path, write_records_to_path};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use thela_core::{FoodItem, ValidationError, require_positive_quantity};
use tracing::warn;

/// Errors raised by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown food item: {0}")]
    UnknownItem(String),

    #[error("insufficient stock for {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: String,
        requested: u32,
        available: u32,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One persisted ledger line: the item plus its in-flight balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(flatten)]
    pub item: FoodItem,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub in_flight: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[derive(Debug)]
struct LedgerEntry {
    item: FoodItem,
    in_flight: u32,
}

/// Per-item stock counters behind per-item locks.
///
/// Operations on the same item serialize on that item's lock; operations on
/// different items proceed in parallel. The outer index is write-locked only
/// to insert entries.
#[derive(Debug, Default)]
pub struct InventoryLedger {
    entries: RwLock<BTreeMap<String, Arc<Mutex<LedgerEntry>>>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item's catalog fields and stock.
    ///
    /// An existing entry keeps its in-flight balance across the replace.
    pub fn upsert_item(&self, item: FoodItem) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(&item.id) {
            Some(entry) => {
                let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
                entry.item = item;
            }
            None => {
                entries.insert(
                    item.id.clone(),
                    Arc::new(Mutex::new(LedgerEntry { item, in_flight: 0 })),
                );
            }
        }
    }

    /// Snapshot one item.
    pub fn item(&self, item_id: &str) -> Option<FoodItem> {
        let entry = self.entry(item_id)?;
        let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(entry.item.clone())
    }

    /// Current stock level of one item.
    pub fn stock(&self, item_id: &str) -> Option<u32> {
        self.item(item_id).map(|item| item.stock)
    }

    /// Snapshot all items in deterministic id order.
    pub fn list(&self) -> Vec<FoodItem> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .map(|entry| entry.lock().unwrap_or_else(|e| e.into_inner()).item.clone())
            .collect()
    }

    /// Decrement stock by `qty`, recording a matching in-flight balance.
    ///
    /// Fails without side effect when `qty` exceeds current stock. Returns
    /// the new stock level.
    pub fn reserve(&self, item_id: &str, qty: u32) -> Result<u32, LedgerError> {
        require_positive_quantity("quantity", qty)?;
        let entry = self
            .entry(item_id)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        if qty > entry.item.stock {
            return Err(LedgerError::InsufficientStock {
                item_id: item_id.to_string(),
                requested: qty,
                available: entry.item.stock,
            });
        }
        entry.item.stock -= qty;
        entry.in_flight += qty;
        Ok(entry.item.stock)
    }

    /// Increment stock by up to the item's in-flight balance.
    ///
    /// A release exceeding the balance has no matching reserve or delivery
    /// expectation: the overshoot is clamped off and logged, and the calling
    /// operation still succeeds. Returns the new stock level.
    pub fn release(&self, item_id: &str, qty: u32) -> Result<u32, LedgerError> {
        require_positive_quantity("quantity", qty)?;
        let entry = self
            .entry(item_id)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        let credited = qty.min(entry.in_flight);
        if credited < qty {
            warn!(
                item_id,
                requested = qty,
                in_flight = entry.in_flight,
                "inconsistent release: no matching reserve; clamping"
            );
        }
        entry.item.stock += credited;
        entry.in_flight -= credited;
        Ok(entry.item.stock)
    }

    /// Register inbound units for an item, creating the entry on demand.
    ///
    /// Pure bookkeeping: bumps the in-flight balance so a later `release`
    /// (the delivery) has a matching expectation. Cannot fail on state.
    pub fn expect_delivery(&self, item_id: &str, qty: u32) -> Result<(), LedgerError> {
        require_positive_quantity("quantity", qty)?;
        let entry = self.entry_or_create(item_id);
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        entry.in_flight += qty;
        Ok(())
    }

    /// Set an item's absolute stock level (admin restock path).
    pub fn adjust_stock(&self, item_id: &str, stock: u32) -> Result<FoodItem, LedgerError> {
        let entry = self
            .entry(item_id)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.to_string()))?;
        let mut entry = entry.lock().unwrap_or_else(|e| e.into_inner());
        entry.item.stock = stock;
        Ok(entry.item.clone())
    }

    /// Hydrate from a JSONL snapshot. Later lines win on duplicate ids.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let records: Vec<LedgerRecord> = read_records_from_path(path)?;
        let ledger = Self::new();
        {
            let mut entries = ledger.entries.write().unwrap_or_else(|e| e.into_inner());
            for record in records {
                entries.insert(
                    record.item.id.clone(),
                    Arc::new(Mutex::new(LedgerEntry {
                        item: record.item,
                        in_flight: record.in_flight,
                    })),
                );
            }
        }
        Ok(ledger)
    }

    /// Flush all entries to a JSONL snapshot.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), JsonlError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let records: Vec<LedgerRecord> = entries
            .values()
            .map(|entry| {
                let entry = entry.lock().unwrap_or_else(|e| e.into_inner());
                LedgerRecord {
                    item: entry.item.clone(),
                    in_flight: entry.in_flight,
                }
            })
            .collect();
        drop(entries);
        write_records_to_path(path, &records)
    }

    fn entry(&self, item_id: &str) -> Option<Arc<Mutex<LedgerEntry>>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(item_id).cloned()
    }

    fn entry_or_create(&self, item_id: &str) -> Arc<Mutex<LedgerEntry>> {
        if let Some(entry) = self.entry(item_id) {
            return entry;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(item_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(LedgerEntry {
                    item: FoodItem::new(item_id, "", ""),
                    in_flight: 0,
                }))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn ledger_with(item_id: &str, stock: u32) -> InventoryLedger {
        let ledger = InventoryLedger::new();
        ledger.upsert_item(FoodItem::new(item_id, "Chai", "cups").with_stock(stock));
        ledger
    }

    #[test]
    fn reserve_decrements_and_rejects_shortfall() {
        let ledger = ledger_with("chai", 10);

        assert_eq!(ledger.reserve("chai", 7).expect("reserve should succeed"), 3);
        let err = ledger.reserve("chai", 5).expect_err("shortfall must fail");
        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                requested: 5,
                available: 3,
                ..
            }
        ));
        assert_eq!(ledger.stock("chai"), Some(3));
    }

    #[test]
    fn release_restores_reserved_stock() {
        let ledger = ledger_with("chai", 10);
        ledger.reserve("chai", 7).expect("reserve should succeed");

        assert_eq!(ledger.release("chai", 7).expect("release should succeed"), 10);
    }

    #[test]
    fn release_without_reserve_clamps_instead_of_failing() {
        let ledger = ledger_with("chai", 10);
        ledger.reserve("chai", 2).expect("reserve should succeed");

        // 5 requested, only 2 in flight: credit 2, drop 3, do not fail.
        assert_eq!(ledger.release("chai", 5).expect("release should clamp"), 10);
        assert_eq!(ledger.release("chai", 1).expect("release should clamp"), 10);
    }

    #[test]
    fn expect_delivery_gives_release_a_matching_balance() {
        let ledger = InventoryLedger::new();
        let cart = thela_core::cart_item_id("r1", "chai");

        ledger
            .expect_delivery(&cart, 5)
            .expect("expectation should register");
        assert_eq!(ledger.stock(&cart), Some(0));
        assert_eq!(ledger.release(&cart, 5).expect("delivery should credit"), 5);
    }

    #[test]
    fn zero_quantities_are_rejected_before_any_state_read() {
        let ledger = ledger_with("chai", 10);
        assert!(matches!(
            ledger.reserve("chai", 0),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.release("missing-item", 0),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn concurrent_reserves_never_oversell() {
        let ledger = Arc::new(ledger_with("chai", 10));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.reserve("chai", 4).is_ok()
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("reserver thread should not panic"))
            .filter(|ok| *ok)
            .count();

        // 10 units cover at most two 4-unit reserves.
        assert_eq!(successes, 2);
        assert_eq!(ledger.stock("chai"), Some(2));
    }

    #[test]
    fn snapshot_round_trips_in_flight_balance() {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("thela-ledger-{unique}.jsonl"));

        let ledger = ledger_with("chai", 10);
        ledger.reserve("chai", 4).expect("reserve should succeed");
        ledger.save_jsonl(&path).expect("snapshot should save");

        let restored = InventoryLedger::load_jsonl(&path).expect("snapshot should load");
        assert_eq!(restored.stock("chai"), Some(6));
        // The outstanding reserve survives the restart and can be rolled back.
        assert_eq!(restored.release("chai", 4).expect("release should credit"), 10);

        let _ = std::fs::remove_file(path);
    }
}
