//! # thela-core
//!
//! Shared types for the thela assignment-and-fulfillment workflow.
//!
//! This crate provides:
//! - actor identity and roles (`Actor`, `ActorRole`)
//! - allocatable resources (`Resource`, `Availability`)
//! - inventory and menu types (`FoodItem`, `Combo`)
//! - the `Assignment` record and its status
//! - refill/prep request records and their status machines
//! - input validation shared by every entry point
//!
//! It intentionally holds no mutable state and no side-effectful logic.
//! Stores live in `thela-store`; the workflow itself lives in `thela-flow`.

pub mod assignment;
pub mod error;
pub mod food;
pub mod ids;
pub mod request;
pub mod resource;
pub mod role;

pub use assignment::{Assignment, AssignmentStatus};
pub use error::ValidationError;
pub use food::{Combo, ComboQuantity, FoodItem, FoodSnapshot, ItemQuantity};
pub use ids::{
    cart_item_id, is_valid_id_token, new_assignment_id, new_prep_request_id,
    new_refill_request_id, require_id_token, require_positive_quantity,
};
pub use request::{PrepRequest, PrepStatus, RefillRequest, RefillStatus};
pub use resource::{Availability, ReleaseState, Resource, ResourceKind};
pub use role::{Actor, ActorRole};
