//! Scripted end-to-end cycle: allocate a shift, run a refill through
//! delivery, run a prep batch through pickup.

use super::seed::seed_workflow;
use serde_json::json;
use std::collections::BTreeMap;
use thela_core::{
    Actor, ActorRole, ItemQuantity, PrepStatus, RefillStatus, ReleaseState, cart_item_id,
};
use thela_flow::{
    CreateAssignment, CreatePrep, CreateRefill, PrepTransition, RefillTransition, Workflow,
};

pub fn run(json: bool) {
    if let Err(err) = run_demo(json) {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run_demo(json_output: bool) -> Result<(), String> {
    let workflow = Workflow::in_memory();
    seed_workflow(&workflow);

    let supervisor = Actor::new("sup-1", ActorRole::Supervisor);
    let rider = Actor::new("r1", ActorRole::Rider);
    let coordinator = Actor::new("c1", ActorRole::RefillCoordinator);
    let cook = Actor::new("cook-1", ActorRole::Cook);

    let assignment = workflow
        .create_assignment(
            &supervisor,
            CreateAssignment {
                rider_id: "r1".to_string(),
                vehicle_id: "v1".to_string(),
                battery_id: "b1".to_string(),
                route_id: "rt-north".to_string(),
                items: vec![ItemQuantity::new("chai", 10)],
                combos: vec![thela_core::ComboQuantity {
                    combo_id: "combo-breakfast".to_string(),
                    count: 4,
                }],
            },
        )
        .map_err(|e| e.to_string())?;

    let refill = workflow
        .create_refill(
            &rider,
            CreateRefill {
                item_id: "chai".to_string(),
                quantity: 5,
                reason: "running low mid-shift".to_string(),
                priority: None,
            },
        )
        .map_err(|e| e.to_string())?;
    for (actor, target, coordinator_id) in [
        (&supervisor, RefillStatus::Forwarded, Some("c1".to_string())),
        (&coordinator, RefillStatus::InProgress, None),
        (&coordinator, RefillStatus::Delivered, None),
    ] {
        workflow
            .transition_refill(
                actor,
                RefillTransition {
                    request_id: refill.id.clone(),
                    target,
                    coordinator_id,
                    observed_status: None,
                },
            )
            .map_err(|e| e.to_string())?;
    }

    let prep = workflow
        .create_prep(
            &supervisor,
            CreatePrep {
                cook_id: "cook-1".to_string(),
                food_item_id: "samosa".to_string(),
                quantity_to_prepare: 40,
            },
        )
        .map_err(|e| e.to_string())?;
    for target in [PrepStatus::Processing, PrepStatus::Ready, PrepStatus::Picked] {
        workflow
            .transition_prep(
                &cook,
                PrepTransition {
                    request_id: prep.id.clone(),
                    target,
                    observed_status: None,
                },
            )
            .map_err(|e| e.to_string())?;
    }

    let mut outcomes = BTreeMap::new();
    outcomes.insert("b1".to_string(), ReleaseState::Unavailable);
    let completed = workflow
        .complete_assignment(&supervisor, &assignment.id, &outcomes)
        .map_err(|e| e.to_string())?;

    let cart = cart_item_id("r1", "chai");
    let cart_stock = workflow.ledger().stock(&cart).unwrap_or(0);
    let chai_stock = workflow.ledger().stock("chai").unwrap_or(0);
    let samosa_stock = workflow.ledger().stock("samosa").unwrap_or(0);

    if json_output {
        println!(
            "{}",
            json!({
                "assignment": {
                    "id": completed.id,
                    "status": completed.status.as_str(),
                    "items": completed.items,
                },
                "refill": {
                    "id": refill.id,
                    "status": RefillStatus::Delivered.as_str(),
                    "rider_cart_stock": cart_stock,
                },
                "prep": {
                    "id": prep.id,
                    "consumed": workflow.requests().prep(&prep.id).is_none(),
                },
                "stock": { "chai": chai_stock, "samosa": samosa_stock },
            })
        );
    } else {
        println!("assignment {} -> {}", completed.id, completed.status.as_str());
        println!(
            "refill {} -> delivered ({} chai now on {}'s cart)",
            refill.id, cart_stock, completed.rider_id
        );
        println!("prep {} -> picked and consumed", prep.id);
        println!("depot stock: chai {chai_stock}, samosa {samosa_stock}");
    }
    Ok(())
}
