//! Combo catalog: menu-level bundles of food items.
//!
//! Combos carry no stock of their own. `expand` resolves a combo into the
//! component item quantities the allocator checks against the ledger.

use crate::jsonl::{JsonlError, read_records_from_path, write_records_to_path};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;
use thela_core::{Combo, ItemQuantity};

/// Errors raised by catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown combo: {0}")]
    UnknownCombo(String),

    #[error("combo {combo_id} has no components")]
    EmptyCombo { combo_id: String },
}

/// Combo definitions keyed by id. CRUD is coarse-grained: combos are menu
/// metadata, not contended workflow state.
#[derive(Debug, Default)]
pub struct ComboCatalog {
    combos: RwLock<BTreeMap<String, Combo>>,
}

impl ComboCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a combo. Returns the previous definition if present.
    pub fn upsert(&self, combo: Combo) -> Option<Combo> {
        let mut combos = self.combos.write().unwrap_or_else(|e| e.into_inner());
        combos.insert(combo.id.clone(), combo)
    }

    /// Remove a combo by id.
    pub fn remove(&self, combo_id: &str) -> Result<Combo, CatalogError> {
        let mut combos = self.combos.write().unwrap_or_else(|e| e.into_inner());
        combos
            .remove(combo_id)
            .ok_or_else(|| CatalogError::UnknownCombo(combo_id.to_string()))
    }

    pub fn get(&self, combo_id: &str) -> Option<Combo> {
        let combos = self.combos.read().unwrap_or_else(|e| e.into_inner());
        combos.get(combo_id).cloned()
    }

    /// Snapshot all combos in deterministic id order.
    pub fn list(&self) -> Vec<Combo> {
        let combos = self.combos.read().unwrap_or_else(|e| e.into_inner());
        combos.values().cloned().collect()
    }

    /// Resolve `count` servings of a combo into component item quantities.
    pub fn expand(&self, combo_id: &str, count: u32) -> Result<Vec<ItemQuantity>, CatalogError> {
        let combos = self.combos.read().unwrap_or_else(|e| e.into_inner());
        let combo = combos
            .get(combo_id)
            .ok_or_else(|| CatalogError::UnknownCombo(combo_id.to_string()))?;
        if combo.components.is_empty() {
            return Err(CatalogError::EmptyCombo {
                combo_id: combo_id.to_string(),
            });
        }
        Ok(combo
            .components
            .iter()
            .map(|component| {
                ItemQuantity::new(component.food_item_id.clone(), component.quantity * count)
            })
            .collect())
    }

    /// Hydrate from a JSONL snapshot. Later lines win on duplicate ids.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, JsonlError> {
        let catalog = Self::new();
        for record in read_records_from_path::<Combo>(path)? {
            catalog.upsert(record);
        }
        Ok(catalog)
    }

    /// Flush all combos to a JSONL snapshot.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), JsonlError> {
        write_records_to_path(path, &self.list())
    }
}
