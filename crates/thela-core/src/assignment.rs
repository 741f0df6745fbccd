//! The assignment record: one rider shift's bundle of resources and stock.

use crate::food::ItemQuantity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// The bundle of rider + vehicle + battery + route + food allocation for one
/// shift.
///
/// Invariant: all four resource ids were `available` immediately before
/// creation and are `in_use` immediately after; every item quantity was
/// covered by stock at allocation time and stock was decremented by exactly
/// that quantity in the same operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub rider_id: String,
    pub vehicle_id: String,
    pub battery_id: String,
    pub route_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemQuantity>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
}

impl Assignment {
    /// The four owned resource ids in the fixed acquisition order.
    pub fn resource_ids(&self) -> [&str; 4] {
        [
            self.rider_id.as_str(),
            self.vehicle_id.as_str(),
            self.battery_id.as_str(),
            self.route_id.as_str(),
        ]
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_follow_acquisition_order() {
        let assignment = Assignment {
            id: "asg-1".to_string(),
            rider_id: "r1".to_string(),
            vehicle_id: "v1".to_string(),
            battery_id: "b1".to_string(),
            route_id: "rt1".to_string(),
            items: vec![],
            created_at: Utc::now(),
            completed_at: None,
            status: AssignmentStatus::Active,
        };
        assert_eq!(assignment.resource_ids(), ["r1", "v1", "b1", "rt1"]);
        assert!(assignment.is_active());
    }
}
