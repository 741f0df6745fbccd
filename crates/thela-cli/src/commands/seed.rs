//! Seed a data directory with sample fixtures.

use serde_json::json;
use thela_core::{Combo, FoodItem, ItemQuantity, Resource, ResourceKind};
use thela_flow::Workflow;

/// Populate a workflow with the demo fleet, menu, and opening stock.
pub(crate) fn seed_workflow(workflow: &Workflow) {
    for (id, kind, name) in [
        ("r1", ResourceKind::Rider, "Asha"),
        ("r2", ResourceKind::Rider, "Vikram"),
        ("v1", ResourceKind::Vehicle, "Cart 1"),
        ("v2", ResourceKind::Vehicle, "Cart 2"),
        ("b1", ResourceKind::Battery, "Battery A"),
        ("b2", ResourceKind::Battery, "Battery B"),
        ("rt-north", ResourceKind::Route, "North market loop"),
        ("rt-south", ResourceKind::Route, "South station loop"),
    ] {
        workflow.registry().register(Resource::new(id, kind, name));
    }

    for (id, name, unit, stock) in [
        ("chai", "Chai", "cups", 40),
        ("samosa", "Samosa", "pieces", 60),
        ("vada-pav", "Vada Pav", "pieces", 30),
    ] {
        workflow
            .ledger()
            .upsert_item(FoodItem::new(id, name, unit).with_stock(stock));
    }

    workflow.catalog().upsert(Combo {
        id: "combo-breakfast".to_string(),
        name: "Breakfast".to_string(),
        components: vec![
            ItemQuantity::new("chai", 1),
            ItemQuantity::new("samosa", 2),
        ],
    });
}

pub fn run(data_dir: String, json: bool) {
    let workflow = Workflow::in_memory();
    seed_workflow(&workflow);

    if let Err(err) = workflow.save(&data_dir) {
        eprintln!("seed failed: {err}");
        std::process::exit(1);
    }

    let resources = workflow.registry().list().len();
    let foods = workflow.ledger().list().len();
    let combos = workflow.catalog().list().len();
    if json {
        println!(
            "{}",
            json!({
                "data_dir": data_dir,
                "resources": resources,
                "foods": foods,
                "combos": combos,
            })
        );
    } else {
        println!("seeded {data_dir}: {resources} resources, {foods} foods, {combos} combos");
    }
}
