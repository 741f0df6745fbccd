//! Wire-shape stability for persisted/API-visible records.
//!
//! Field names and status literals are load-bearing for clients and JSONL
//! snapshots; these pin them down.

use chrono::{TimeZone, Utc};
use thela_core::{
    Assignment, AssignmentStatus, FoodSnapshot, ItemQuantity, PrepRequest, RefillRequest,
    RefillStatus, Resource, ResourceKind,
};

fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 23, 6, 30, 0)
        .single()
        .expect("fixed time")
}

#[test]
fn assignment_wire_shape() {
    let assignment = Assignment {
        id: "asg-1".to_string(),
        rider_id: "r1".to_string(),
        vehicle_id: "v1".to_string(),
        battery_id: "b1".to_string(),
        route_id: "rt1".to_string(),
        items: vec![ItemQuantity::new("chai", 7)],
        created_at: fixed_time(),
        completed_at: None,
        status: AssignmentStatus::Active,
    };

    insta::assert_json_snapshot!(assignment, @r###"
    {
      "id": "asg-1",
      "rider_id": "r1",
      "vehicle_id": "v1",
      "battery_id": "b1",
      "route_id": "rt1",
      "items": [
        {
          "food_item_id": "chai",
          "quantity": 7
        }
      ],
      "created_at": "2026-02-23T06:30:00Z",
      "status": "active"
    }
    "###);
}

#[test]
fn refill_request_wire_shape() {
    let mut request = RefillRequest::new("rfl-1", "r1", "chai", 5, "evening rush");
    request.created_at = fixed_time();
    request.updated_at = fixed_time();
    request.status = RefillStatus::Forwarded;
    request.assigned_coordinator_id = Some("c1".to_string());

    insta::assert_json_snapshot!(request, @r###"
    {
      "id": "rfl-1",
      "rider_id": "r1",
      "item_id": "chai",
      "quantity": 5,
      "reason": "evening rush",
      "priority": 2,
      "status": "forwarded",
      "assigned_coordinator_id": "c1",
      "created_at": "2026-02-23T06:30:00Z",
      "updated_at": "2026-02-23T06:30:00Z"
    }
    "###);
}

#[test]
fn prep_request_wire_shape() {
    let mut request = PrepRequest::new(
        "prep-1",
        "cook-1",
        FoodSnapshot {
            food_item_id: "samosa".to_string(),
            name: "Samosa".to_string(),
            unit_label: "pieces".to_string(),
        },
        40,
    );
    request.created_at = fixed_time();
    request.updated_at = fixed_time();

    insta::assert_json_snapshot!(request, @r###"
    {
      "id": "prep-1",
      "cook_id": "cook-1",
      "food": {
        "food_item_id": "samosa",
        "name": "Samosa",
        "unit_label": "pieces"
      },
      "quantity_to_prepare": 40,
      "status": "queued",
      "created_at": "2026-02-23T06:30:00Z",
      "updated_at": "2026-02-23T06:30:00Z"
    }
    "###);
}

#[test]
fn resource_wire_shape() {
    let resource = Resource::new("v-1", ResourceKind::Vehicle, "Cart 7");

    insta::assert_json_snapshot!(resource, @r###"
    {
      "id": "v-1",
      "kind": "vehicle",
      "name": "Cart 7",
      "availability": "available"
    }
    "###);
}
