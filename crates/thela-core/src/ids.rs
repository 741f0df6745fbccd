//! Id construction and input validation helpers.
//!
//! Records created by the workflow get prefixed UUID ids. Externally supplied
//! id tokens (resource ids, item ids, actor ids) are validated against one
//! shared token shape before any shared state is read.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Shape of an externally supplied id token: leading alphanumeric, then
/// alphanumerics, dots, underscores, or dashes, at most 64 chars total.
const ID_TOKEN_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$";

fn id_token_regex() -> &'static Regex {
    static ID_TOKEN: OnceLock<Regex> = OnceLock::new();
    ID_TOKEN.get_or_init(|| {
        Regex::new(ID_TOKEN_PATTERN).unwrap_or_else(|e| panic!("id token pattern is valid: {e}"))
    })
}

/// Whether `value` is an acceptable externally supplied id token.
pub fn is_valid_id_token(value: &str) -> bool {
    id_token_regex().is_match(value)
}

/// Validate an externally supplied id token, naming the offending field.
pub fn require_id_token(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if is_valid_id_token(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdToken {
            field,
            value: value.to_string(),
        })
    }
}

/// Validate that a quantity is strictly positive.
pub fn require_positive_quantity(field: &'static str, qty: u32) -> Result<(), ValidationError> {
    if qty == 0 {
        Err(ValidationError::NonPositiveQuantity { field })
    } else {
        Ok(())
    }
}

pub fn new_assignment_id() -> String {
    format!("asg-{}", Uuid::new_v4())
}

pub fn new_refill_request_id() -> String {
    format!("rfl-{}", Uuid::new_v4())
}

pub fn new_prep_request_id() -> String {
    format!("prep-{}", Uuid::new_v4())
}

/// Ledger key for a rider's on-cart balance of one food item.
///
/// Derived internally; never accepted from the wire as an id token.
pub fn cart_item_id(rider_id: &str, food_item_id: &str) -> String {
    format!("cart:{rider_id}:{food_item_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_tokens_accept_common_shapes() {
        assert!(is_valid_id_token("rider-7"));
        assert!(is_valid_id_token("chai"));
        assert!(is_valid_id_token("V1"));
        assert!(is_valid_id_token("route.north_2"));
    }

    #[test]
    fn id_tokens_reject_empty_and_reserved_shapes() {
        assert!(!is_valid_id_token(""));
        assert!(!is_valid_id_token("-leading-dash"));
        assert!(!is_valid_id_token("has space"));
        assert!(!is_valid_id_token("cart:r1:chai"));
        assert!(!is_valid_id_token(&"x".repeat(65)));
    }

    #[test]
    fn require_id_token_names_the_field() {
        let err = require_id_token("rider_id", "").expect_err("empty token must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidIdToken { field: "rider_id", .. }
        ));
    }

    #[test]
    fn cart_ids_are_scoped_per_rider_and_item() {
        assert_eq!(cart_item_id("r1", "chai"), "cart:r1:chai");
        assert_ne!(cart_item_id("r1", "chai"), cart_item_id("r2", "chai"));
    }

    #[test]
    fn generated_ids_carry_their_prefix() {
        assert!(new_assignment_id().starts_with("asg-"));
        assert!(new_refill_request_id().starts_with("rfl-"));
        assert!(new_prep_request_id().starts_with("prep-"));
    }
}
