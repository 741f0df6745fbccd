//! Exclusively-allocatable physical assets: riders, vehicles, batteries, routes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What kind of asset a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Rider,
    Vehicle,
    Battery,
    Route,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rider => "rider",
            Self::Vehicle => "vehicle",
            Self::Battery => "battery",
            Self::Route => "route",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finite availability state of a resource.
///
/// `InUse` is owned by exactly one active assignment at a time; the registry
/// is the only writer of this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    InUse,
    Unavailable,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::Unavailable => "unavailable",
        }
    }
}

impl Display for Availability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource lands when an assignment lets go of it.
///
/// `Unavailable` marks the asset defective/out of rotation rather than
/// returning it to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    Available,
    Unavailable,
}

impl From<ReleaseState> for Availability {
    fn from(state: ReleaseState) -> Self {
        match state {
            ReleaseState::Available => Availability::Available,
            ReleaseState::Unavailable => Availability::Unavailable,
        }
    }
}

/// One allocatable asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default = "default_availability")]
    pub availability: Availability,
}

fn default_availability() -> Availability {
    Availability::Available
}

impl Resource {
    pub fn new(id: impl Into<String>, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            availability: Availability::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_defaults_to_available_on_deserialize() {
        let resource: Resource =
            serde_json::from_str(r#"{"id":"v-1","kind":"vehicle"}"#).expect("resource should parse");
        assert_eq!(resource.availability, Availability::Available);
        assert!(resource.name.is_empty());
    }

    #[test]
    fn release_state_maps_into_availability() {
        assert_eq!(
            Availability::from(ReleaseState::Available),
            Availability::Available
        );
        assert_eq!(
            Availability::from(ReleaseState::Unavailable),
            Availability::Unavailable
        );
    }
}
