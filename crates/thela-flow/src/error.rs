//! Typed outcomes for allocator and lifecycle failures.
//!
//! Nothing here is retried automatically: every failure is returned to the
//! caller, which decides whether to refetch and resubmit.

use thela_core::{ActorRole, ResourceKind, ValidationError};
use thela_store::{CatalogError, LedgerError, RegistryError};

/// Failures of assignment allocation, completion, and cancellation.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("role {role} may not manage assignments")]
    RoleNotPermitted { role: ActorRole },

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("resource {id} is a {actual}, expected a {expected}")]
    WrongKind {
        id: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },

    /// Another assignment holds (or raced us to) the resource. Recoverable:
    /// refresh the resource view and retry.
    #[error("resource contention on {resource_id}")]
    ResourceContention { resource_id: String },

    #[error("resource {id} is unavailable")]
    ResourceUnavailable { id: String },

    #[error("unknown food item: {0}")]
    UnknownItem(String),

    /// Requested quantity exceeds current stock. Recoverable: refresh the
    /// stock view and retry.
    #[error("insufficient stock for {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: String,
        requested: u32,
        available: u32,
    },

    #[error("assignment not found: {0}")]
    NotFound(String),

    #[error("assignment {0} is already completed")]
    AlreadyCompleted(String),

    #[error("outcome names a resource not held by the assignment: {resource_id}")]
    UnknownOutcomeResource { resource_id: String },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<RegistryError> for AllocationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::UnknownResource(id),
            RegistryError::AlreadyInUse { id } | RegistryError::NotHeld { id } => {
                Self::ResourceContention { resource_id: id }
            }
            RegistryError::Unavailable { id } => Self::ResourceUnavailable { id },
            RegistryError::WrongKind {
                id,
                expected,
                actual,
            } => Self::WrongKind {
                id,
                expected,
                actual,
            },
        }
    }
}

impl From<LedgerError> for AllocationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownItem(id) => Self::UnknownItem(id),
            LedgerError::InsufficientStock {
                item_id,
                requested,
                available,
            } => Self::InsufficientStock {
                item_id,
                requested,
                available,
            },
            LedgerError::Validation(err) => Self::Validation(err),
        }
    }
}

/// Failures of refill/prep request creation and transitions.
///
/// Statuses are carried as wire literals so both machines share one shape.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("request not found: {0}")]
    NotFound(String),

    /// The status graph has no edge `from -> to`.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// The request already reached a terminal status.
    #[error("request {id} is already terminal ({status})")]
    AlreadyTerminal { id: String, status: String },

    /// The caller's view of the request is out of date.
    #[error("stale state: observed {observed}, current {current}")]
    StaleState { observed: String, current: String },

    #[error("role {role} may not {action}")]
    RoleNotPermitted { role: ActorRole, action: &'static str },

    #[error("unknown food item: {0}")]
    UnknownItem(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
