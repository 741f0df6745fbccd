//! Input validation errors shared by every workflow entry point.

/// Malformed input, rejected before any read of shared state.
///
/// Surfaced directly to the caller as a form-level error; never the result
/// of a race or of stale client state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be a positive quantity")]
    NonPositiveQuantity { field: &'static str },

    #[error("{field} is not a valid id token: {value:?}")]
    InvalidIdToken { field: &'static str, value: String },

    #[error("duplicate item in request: {item_id}")]
    DuplicateItem { item_id: String },

    #[error("a coordinator id is required to forward a refill request")]
    MissingCoordinator,
}
