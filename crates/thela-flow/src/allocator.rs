//! Assignment allocation: the two-phase acquire-then-reserve protocol.
//!
//! Resources are taken before stock, in one fixed order, so a stock
//! shortfall never strands a resource in use and a resource race never
//! leaves stock partially reserved. Rollback is total: a failed create
//! leaves availability and stock exactly as it found them.

use crate::error::AllocationError;
use crate::workflow::Workflow;
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use thela_core::{
    Actor, ActorRole, Assignment, AssignmentStatus, ComboQuantity, ItemQuantity, ReleaseState,
    ResourceKind, ValidationError, new_assignment_id, require_id_token, require_positive_quantity,
};
use thela_store::WorkflowAction;
use tracing::warn;

/// Input to `Workflow::create_assignment`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignment {
    pub rider_id: String,
    pub vehicle_id: String,
    pub battery_id: String,
    pub route_id: String,
    #[serde(default)]
    pub items: Vec<ItemQuantity>,
    #[serde(default)]
    pub combos: Vec<ComboQuantity>,
}

impl CreateAssignment {
    /// The four resource slots in acquisition order, paired with their
    /// expected kinds.
    fn resource_slots(&self) -> [(&str, ResourceKind); 4] {
        [
            (self.rider_id.as_str(), ResourceKind::Rider),
            (self.vehicle_id.as_str(), ResourceKind::Vehicle),
            (self.battery_id.as_str(), ResourceKind::Battery),
            (self.route_id.as_str(), ResourceKind::Route),
        ]
    }
}

fn can_manage_assignments(role: ActorRole) -> bool {
    matches!(role, ActorRole::Supervisor | ActorRole::SuperAdmin)
}

impl Workflow {
    /// Allocate a shift: validate, acquire resources, reserve stock, persist.
    ///
    /// All-or-nothing; see the module docs for the rollback contract.
    pub fn create_assignment(
        &self,
        actor: &Actor,
        request: CreateAssignment,
    ) -> Result<Assignment, AllocationError> {
        if !can_manage_assignments(actor.role) {
            return Err(AllocationError::RoleNotPermitted { role: actor.role });
        }

        // Phase 0: pure input validation, before any read of shared state.
        for (field, id) in [
            ("rider_id", request.rider_id.as_str()),
            ("vehicle_id", request.vehicle_id.as_str()),
            ("battery_id", request.battery_id.as_str()),
            ("route_id", request.route_id.as_str()),
        ] {
            require_id_token(field, id)?;
        }
        for item in &request.items {
            require_id_token("food_item_id", &item.food_item_id)?;
            require_positive_quantity("quantity", item.quantity)?;
        }
        for combo in &request.combos {
            require_id_token("combo_id", &combo.combo_id)?;
            require_positive_quantity("count", combo.count)?;
        }

        let items = self.merged_item_quantities(&request)?;

        // Phase 1: pure reads. Failures here have no side effects.
        for (id, kind) in request.resource_slots() {
            self.registry().expect_available_kind(id, kind)?;
        }
        for (item_id, &quantity) in &items {
            let available = self
                .ledger()
                .stock(item_id)
                .ok_or_else(|| AllocationError::UnknownItem(item_id.clone()))?;
            if quantity > available {
                return Err(AllocationError::InsufficientStock {
                    item_id: item_id.clone(),
                    requested: quantity,
                    available,
                });
            }
        }

        // Phase 2: acquire resources in fixed order; roll back on a race.
        let mut acquired: Vec<&str> = Vec::with_capacity(4);
        for (id, _) in request.resource_slots() {
            if let Err(err) = self.registry().try_acquire(id) {
                self.release_resources(&acquired);
                let err: AllocationError = err.into();
                return Err(match err {
                    // A kind mismatch was ruled out in phase 1; anything that
                    // slipped past the read is a race on this resource.
                    AllocationError::ResourceUnavailable { id }
                    | AllocationError::ResourceContention { resource_id: id } => {
                        AllocationError::ResourceContention { resource_id: id }
                    }
                    other => other,
                });
            }
            acquired.push(id);
        }

        // Phase 3: reserve stock in item-id order; roll back everything on a
        // shortfall.
        let mut reserved: Vec<(&String, u32)> = Vec::with_capacity(items.len());
        for (item_id, &quantity) in &items {
            if let Err(err) = self.ledger().reserve(item_id, quantity) {
                for (reserved_id, reserved_qty) in reserved {
                    if let Err(release_err) = self.ledger().release(reserved_id, reserved_qty) {
                        warn!(item_id = %reserved_id, %release_err, "rollback release failed");
                    }
                }
                self.release_resources(&acquired);
                return Err(err.into());
            }
            reserved.push((item_id, quantity));
        }

        let assignment = Assignment {
            id: new_assignment_id(),
            rider_id: request.rider_id,
            vehicle_id: request.vehicle_id,
            battery_id: request.battery_id,
            route_id: request.route_id,
            items: items
                .into_iter()
                .map(|(food_item_id, quantity)| ItemQuantity {
                    food_item_id,
                    quantity,
                })
                .collect(),
            created_at: Utc::now(),
            completed_at: None,
            status: AssignmentStatus::Active,
        };
        self.assignments().insert(assignment.clone());
        self.publish(
            actor,
            WorkflowAction::AssignmentCreated {
                assignment_id: assignment.id.clone(),
                rider_id: assignment.rider_id.clone(),
            },
        );
        Ok(assignment)
    }

    /// Finish a shift: release each resource per its outcome and mark the
    /// assignment completed. Reserved stock is assumed consumed.
    pub fn complete_assignment(
        &self,
        actor: &Actor,
        assignment_id: &str,
        outcomes: &BTreeMap<String, ReleaseState>,
    ) -> Result<Assignment, AllocationError> {
        if !can_manage_assignments(actor.role) {
            return Err(AllocationError::RoleNotPermitted { role: actor.role });
        }
        let entry = self
            .assignments()
            .entry(assignment_id)
            .ok_or_else(|| AllocationError::NotFound(assignment_id.to_string()))?;
        let mut assignment = entry.lock().unwrap_or_else(|e| e.into_inner());
        if !assignment.is_active() {
            return Err(AllocationError::AlreadyCompleted(assignment_id.to_string()));
        }
        for resource_id in outcomes.keys() {
            if !assignment.resource_ids().contains(&resource_id.as_str()) {
                return Err(AllocationError::UnknownOutcomeResource {
                    resource_id: resource_id.clone(),
                });
            }
        }

        for resource_id in assignment.resource_ids() {
            let next = outcomes
                .get(resource_id)
                .copied()
                .unwrap_or(ReleaseState::Available);
            if let Err(err) = self.registry().release(resource_id, next) {
                // The assignment is the only holder; a failed release means
                // the registry and assignment disagree. Log and keep going so
                // the remaining resources still return to the pool.
                warn!(resource_id, %err, "resource release failed during completion");
            }
        }

        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = Some(Utc::now());
        let completed = assignment.clone();
        drop(assignment);

        self.publish(
            actor,
            WorkflowAction::AssignmentCompleted {
                assignment_id: completed.id.clone(),
            },
        );
        Ok(completed)
    }

    /// Abort a shift before it runs: resources return to the pool and every
    /// reserved item quantity is released back into stock.
    ///
    /// Idempotent at the caller's level: a second cancel observes the
    /// completed status and fails without touching stock again.
    pub fn cancel_assignment(
        &self,
        actor: &Actor,
        assignment_id: &str,
    ) -> Result<Assignment, AllocationError> {
        if !can_manage_assignments(actor.role) {
            return Err(AllocationError::RoleNotPermitted { role: actor.role });
        }
        let entry = self
            .assignments()
            .entry(assignment_id)
            .ok_or_else(|| AllocationError::NotFound(assignment_id.to_string()))?;
        let mut assignment = entry.lock().unwrap_or_else(|e| e.into_inner());
        if !assignment.is_active() {
            return Err(AllocationError::AlreadyCompleted(assignment_id.to_string()));
        }

        for resource_id in assignment.resource_ids() {
            if let Err(err) = self.registry().release(resource_id, ReleaseState::Available) {
                warn!(resource_id, %err, "resource release failed during cancellation");
            }
        }
        for item in &assignment.items {
            if let Err(err) = self.ledger().release(&item.food_item_id, item.quantity) {
                warn!(item_id = %item.food_item_id, %err, "stock release failed during cancellation");
            }
        }

        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = Some(Utc::now());
        let cancelled = assignment.clone();
        drop(assignment);

        self.publish(
            actor,
            WorkflowAction::AssignmentCancelled {
                assignment_id: cancelled.id.clone(),
            },
        );
        Ok(cancelled)
    }

    /// Merge explicit items with expanded combos into one quantity per item.
    ///
    /// Explicit duplicates are caller mistakes and rejected; combo overlap
    /// is expected and additive.
    fn merged_item_quantities(
        &self,
        request: &CreateAssignment,
    ) -> Result<BTreeMap<String, u32>, AllocationError> {
        let mut merged: BTreeMap<String, u32> = BTreeMap::new();
        for item in &request.items {
            if merged
                .insert(item.food_item_id.clone(), item.quantity)
                .is_some()
            {
                return Err(ValidationError::DuplicateItem {
                    item_id: item.food_item_id.clone(),
                }
                .into());
            }
        }
        for combo in &request.combos {
            for component in self.catalog().expand(&combo.combo_id, combo.count)? {
                *merged.entry(component.food_item_id).or_insert(0) += component.quantity;
            }
        }
        Ok(merged)
    }

    fn release_resources(&self, acquired: &[&str]) {
        for resource_id in acquired {
            if let Err(err) = self.registry().release(resource_id, ReleaseState::Available) {
                warn!(resource_id, %err, "rollback release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use thela_core::{Availability, Combo, FoodItem, Resource};

    fn supervisor() -> Actor {
        Actor::new("sup-1", ActorRole::Supervisor)
    }

    fn seeded_workflow() -> Workflow {
        let workflow = Workflow::in_memory();
        for (id, kind) in [
            ("r1", ResourceKind::Rider),
            ("r2", ResourceKind::Rider),
            ("v1", ResourceKind::Vehicle),
            ("v2", ResourceKind::Vehicle),
            ("b1", ResourceKind::Battery),
            ("b2", ResourceKind::Battery),
            ("rt1", ResourceKind::Route),
            ("rt2", ResourceKind::Route),
        ] {
            workflow.registry().register(Resource::new(id, kind, ""));
        }
        workflow
            .ledger()
            .upsert_item(FoodItem::new("chai", "Chai", "cups").with_stock(10));
        workflow
            .ledger()
            .upsert_item(FoodItem::new("samosa", "Samosa", "pieces").with_stock(20));
        workflow
    }

    fn basic_request(items: Vec<ItemQuantity>) -> CreateAssignment {
        CreateAssignment {
            rider_id: "r1".to_string(),
            vehicle_id: "v1".to_string(),
            battery_id: "b1".to_string(),
            route_id: "rt1".to_string(),
            items,
            combos: vec![],
        }
    }

    fn availability(workflow: &Workflow, id: &str) -> Availability {
        workflow
            .registry()
            .resource(id)
            .expect("resource should exist")
            .availability
    }

    #[test]
    fn create_flips_resources_and_decrements_stock() {
        let workflow = seeded_workflow();
        let assignment = workflow
            .create_assignment(&supervisor(), basic_request(vec![ItemQuantity::new("chai", 7)]))
            .expect("allocation should succeed");

        assert_eq!(assignment.status, AssignmentStatus::Active);
        for id in ["r1", "v1", "b1", "rt1"] {
            assert_eq!(availability(&workflow, id), Availability::InUse);
        }
        assert_eq!(workflow.ledger().stock("chai"), Some(3));
    }

    #[test]
    fn stock_shortfall_rolls_back_every_acquisition() {
        let workflow = seeded_workflow();
        let err = workflow
            .create_assignment(
                &supervisor(),
                basic_request(vec![
                    ItemQuantity::new("samosa", 5),
                    ItemQuantity::new("chai", 11),
                ]),
            )
            .expect_err("over-stock request must fail");

        assert!(matches!(err, AllocationError::InsufficientStock { .. }));
        for id in ["r1", "v1", "b1", "rt1"] {
            assert_eq!(availability(&workflow, id), Availability::Available);
        }
        assert_eq!(workflow.ledger().stock("chai"), Some(10));
        assert_eq!(workflow.ledger().stock("samosa"), Some(20));
    }

    #[test]
    fn mid_sequence_shortfall_releases_earlier_reservations() {
        let workflow = seeded_workflow();
        // "chai" sorts before "samosa": chai reserves, samosa fails.
        let err = workflow
            .create_assignment(
                &supervisor(),
                basic_request(vec![
                    ItemQuantity::new("chai", 4),
                    ItemQuantity::new("samosa", 21),
                ]),
            )
            .expect_err("second reservation must fail");

        assert!(
            matches!(err, AllocationError::InsufficientStock { ref item_id, .. } if item_id == "samosa")
        );
        assert_eq!(workflow.ledger().stock("chai"), Some(10));
        assert_eq!(workflow.ledger().stock("samosa"), Some(20));
    }

    #[test]
    fn contended_vehicle_admits_exactly_one_assignment() {
        let workflow = Arc::new(seeded_workflow());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [("r1", "b1", "rt1"), ("r2", "b2", "rt2")]
            .into_iter()
            .map(|(rider, battery, route)| {
                let workflow = Arc::clone(&workflow);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    workflow.create_assignment(
                        &supervisor(),
                        CreateAssignment {
                            rider_id: rider.to_string(),
                            vehicle_id: "v1".to_string(),
                            battery_id: battery.to_string(),
                            route_id: route.to_string(),
                            items: vec![],
                            combos: vec![],
                        },
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("allocator thread should not panic"))
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert_eq!(availability(&workflow, "v1"), Availability::InUse);
        // The loser's own rider/battery/route rolled back to the pool.
        let losers: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
        assert_eq!(losers.len(), 1);
    }

    #[test]
    fn combo_expansion_feeds_the_stock_check() {
        let workflow = seeded_workflow();
        workflow.catalog().upsert(Combo {
            id: "combo-breakfast".to_string(),
            name: "Breakfast".to_string(),
            components: vec![
                ItemQuantity::new("chai", 1),
                ItemQuantity::new("samosa", 2),
            ],
        });

        let request = CreateAssignment {
            combos: vec![ComboQuantity {
                combo_id: "combo-breakfast".to_string(),
                count: 3,
            }],
            ..basic_request(vec![ItemQuantity::new("chai", 2)])
        };
        let assignment = workflow
            .create_assignment(&supervisor(), request)
            .expect("combo allocation should succeed");

        // 2 explicit + 3 from combos = 5 chai; 6 samosa.
        assert_eq!(workflow.ledger().stock("chai"), Some(5));
        assert_eq!(workflow.ledger().stock("samosa"), Some(14));
        assert_eq!(
            assignment.items,
            vec![ItemQuantity::new("chai", 5), ItemQuantity::new("samosa", 6)]
        );
    }

    #[test]
    fn duplicate_explicit_items_are_rejected_before_any_mutation() {
        let workflow = seeded_workflow();
        let err = workflow
            .create_assignment(
                &supervisor(),
                basic_request(vec![
                    ItemQuantity::new("chai", 1),
                    ItemQuantity::new("chai", 2),
                ]),
            )
            .expect_err("duplicate items must fail");
        assert!(matches!(
            err,
            AllocationError::Validation(ValidationError::DuplicateItem { .. })
        ));
        assert_eq!(availability(&workflow, "r1"), Availability::Available);
    }

    #[test]
    fn wrong_kind_in_a_slot_is_rejected_purely() {
        let workflow = seeded_workflow();
        let mut request = basic_request(vec![]);
        request.vehicle_id = "b1".to_string();

        let err = workflow
            .create_assignment(&supervisor(), request)
            .expect_err("battery in the vehicle slot must fail");
        assert!(matches!(err, AllocationError::WrongKind { .. }));
        assert_eq!(availability(&workflow, "b1"), Availability::Available);
    }

    #[test]
    fn complete_honors_per_resource_outcomes() {
        let workflow = seeded_workflow();
        let assignment = workflow
            .create_assignment(&supervisor(), basic_request(vec![]))
            .expect("allocation should succeed");

        let mut outcomes = BTreeMap::new();
        outcomes.insert("b1".to_string(), ReleaseState::Unavailable);
        let completed = workflow
            .complete_assignment(&supervisor(), &assignment.id, &outcomes)
            .expect("completion should succeed");

        assert_eq!(completed.status, AssignmentStatus::Completed);
        assert_eq!(availability(&workflow, "b1"), Availability::Unavailable);
        for id in ["r1", "v1", "rt1"] {
            assert_eq!(availability(&workflow, id), Availability::Available);
        }
    }

    #[test]
    fn complete_does_not_release_stock() {
        let workflow = seeded_workflow();
        let assignment = workflow
            .create_assignment(&supervisor(), basic_request(vec![ItemQuantity::new("chai", 7)]))
            .expect("allocation should succeed");

        workflow
            .complete_assignment(&supervisor(), &assignment.id, &BTreeMap::new())
            .expect("completion should succeed");
        assert_eq!(workflow.ledger().stock("chai"), Some(3));
    }

    #[test]
    fn cancel_releases_stock_exactly_once() {
        let workflow = seeded_workflow();
        let assignment = workflow
            .create_assignment(&supervisor(), basic_request(vec![ItemQuantity::new("chai", 7)]))
            .expect("allocation should succeed");
        assert_eq!(workflow.ledger().stock("chai"), Some(3));

        workflow
            .cancel_assignment(&supervisor(), &assignment.id)
            .expect("cancel should succeed");
        assert_eq!(workflow.ledger().stock("chai"), Some(10));
        assert_eq!(availability(&workflow, "v1"), Availability::Available);

        let err = workflow
            .cancel_assignment(&supervisor(), &assignment.id)
            .expect_err("second cancel must be rejected");
        assert!(matches!(err, AllocationError::AlreadyCompleted(_)));
        assert_eq!(workflow.ledger().stock("chai"), Some(10));
    }

    #[test]
    fn every_successful_mutation_publishes_one_event() {
        use thela_store::EventLog;

        let log = Arc::new(EventLog::new());
        let workflow = Workflow::new(log.clone());
        workflow
            .registry()
            .register(thela_core::Resource::new("r1", ResourceKind::Rider, ""));
        workflow
            .registry()
            .register(thela_core::Resource::new("v1", ResourceKind::Vehicle, ""));
        workflow
            .registry()
            .register(thela_core::Resource::new("b1", ResourceKind::Battery, ""));
        workflow
            .registry()
            .register(thela_core::Resource::new("rt1", ResourceKind::Route, ""));

        let assignment = workflow
            .create_assignment(&supervisor(), basic_request(vec![]))
            .expect("allocation should succeed");
        workflow
            .cancel_assignment(&supervisor(), &assignment.id)
            .expect("cancel should succeed");

        let kinds: Vec<&str> = log.events().iter().map(|e| e.action.kind()).collect();
        assert_eq!(kinds, vec!["assignment.created", "assignment.cancelled"]);
    }

    #[test]
    fn riders_may_not_allocate() {
        let workflow = seeded_workflow();
        let err = workflow
            .create_assignment(
                &Actor::new("r1", ActorRole::Rider),
                basic_request(vec![]),
            )
            .expect_err("rider must not allocate");
        assert!(matches!(err, AllocationError::RoleNotPermitted { .. }));
    }
}
