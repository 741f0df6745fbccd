//! Actor identity as resolved by the session layer.
//!
//! Authentication is out of scope: the HTTP layer maps a bearer token to an
//! `Actor` and the workflow treats the role as an opaque, already-resolved
//! input.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Operational role of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Rider,
    Cook,
    Supervisor,
    RefillCoordinator,
    SuperAdmin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Cook => "cook",
            Self::Supervisor => "supervisor",
            Self::RefillCoordinator => "refill_coordinator",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Parse a wire role literal.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rider" => Some(Self::Rider),
            "cook" => Some(Self::Cook),
            "supervisor" => Some(Self::Supervisor),
            "refill_coordinator" => Some(Self::RefillCoordinator),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved caller: stable id plus role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_literals_round_trip() {
        for role in [
            ActorRole::Rider,
            ActorRole::Cook,
            ActorRole::Supervisor,
            ActorRole::RefillCoordinator,
            ActorRole::SuperAdmin,
        ] {
            assert_eq!(ActorRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ActorRole::parse("admin"), None);
    }
}
