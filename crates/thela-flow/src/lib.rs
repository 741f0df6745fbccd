//! # thela-flow
//!
//! The workflow layer: assignment allocation and request lifecycles composed
//! over the stores in `thela-store`.
//!
//! This crate provides:
//! - `Workflow`: the aggregate handle over ledger, registry, catalog,
//!   request/assignment stores, and the event sink
//! - assignment allocation (`create_assignment`, `complete_assignment`,
//!   `cancel_assignment`): the two-phase acquire-then-reserve protocol with
//!   total rollback
//! - the refill lifecycle (rider -> coordinator) and the prep lifecycle
//!   (supervisor -> cook), role-gated and check-then-set per request
//! - actor-scoped read views for rendering
//!
//! Every failure is a typed result; nothing here retries or panics.

pub mod allocator;
pub mod error;
pub mod prep;
pub mod refill;
pub mod views;
pub mod workflow;

pub use allocator::CreateAssignment;
pub use error::{AllocationError, TransitionError};
pub use prep::{CreatePrep, PrepTransition};
pub use refill::{CreateRefill, RefillTransition};
pub use views::PendingCounts;
pub use workflow::{Workflow, snapshot};
