//! Inventory and menu types: food items, per-assignment quantities, combos.

use serde::{Deserialize, Serialize};

/// One stocked food item.
///
/// `stock` is the single source of truth for "available to allocate" and is
/// mutated only through ledger operations, never read-modify-written by
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_label: String,
    #[serde(default)]
    pub stock: u32,
}

impl FoodItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_label: unit_label.into(),
            stock: 0,
        }
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }
}

/// A (food item, quantity) pair as used by assignments and combos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantity {
    pub food_item_id: String,
    pub quantity: u32,
}

impl ItemQuantity {
    pub fn new(food_item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            food_item_id: food_item_id.into(),
            quantity,
        }
    }
}

/// A menu-level bundle of food items.
///
/// Combos never carry stock of their own; allocation expands them into
/// component item quantities before any stock check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pub id: String,
    pub name: String,
    pub components: Vec<ItemQuantity>,
}

/// A (combo, count) pair in an allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboQuantity {
    pub combo_id: String,
    pub count: u32,
}

/// Immutable copy of the food item a prep request was raised for.
///
/// Snapshotted at creation so later menu edits do not rewrite what the cook
/// was asked to prepare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub food_item_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit_label: String,
}

impl FoodSnapshot {
    pub fn of(item: &FoodItem) -> Self {
        Self {
            food_item_id: item.id.clone(),
            name: item.name.clone(),
            unit_label: item.unit_label.clone(),
        }
    }
}
