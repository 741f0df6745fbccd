//! Refill and prep request records and their status graphs.
//!
//! Which status may follow which is intrinsic to the data and lives here;
//! who is allowed to drive a transition (and what side effects it carries)
//! is workflow policy and lives in `thela-flow`.

use crate::food::FoodSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Status of a rider-originated refill request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefillStatus {
    Pending,
    Forwarded,
    Rejected,
    InProgress,
    Delivered,
}

impl RefillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Forwarded => "forwarded",
            Self::Rejected => "rejected",
            Self::InProgress => "in-progress",
            Self::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "forwarded" => Some(Self::Forwarded),
            "rejected" => Some(Self::Rejected),
            "in-progress" => Some(Self::InProgress),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Delivered)
    }

    /// Whether the status graph has an edge `self -> target`.
    pub fn allows(&self, target: RefillStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Forwarded)
                | (Self::Pending, Self::Rejected)
                | (Self::Forwarded, Self::InProgress)
                | (Self::InProgress, Self::Delivered)
        )
    }
}

impl Display for RefillStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rider's request to have cart stock of one item topped up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillRequest {
    pub id: String,
    pub rider_id: String,
    pub item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_refill_status")]
    pub status: RefillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_coordinator_id: Option<String>,
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_priority() -> i32 {
    2
}

fn default_refill_status() -> RefillStatus {
    RefillStatus::Pending
}

fn default_timestamp() -> DateTime<Utc> {
    Utc::now()
}

impl RefillRequest {
    pub fn new(
        id: impl Into<String>,
        rider_id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: u32,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            rider_id: rider_id.into(),
            item_id: item_id.into(),
            quantity,
            reason: reason.into(),
            priority: default_priority(),
            status: RefillStatus::Pending,
            assigned_coordinator_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch_updated_at(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Status of a supervisor-originated prep request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepStatus {
    Queued,
    Processing,
    Ready,
    Picked,
}

impl PrepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Picked => "picked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "picked" => Some(Self::Picked),
            _ => None,
        }
    }

    /// `picked` consumes the request; nothing follows it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Picked)
    }

    /// Whether the status graph has an edge `self -> target`.
    pub fn allows(&self, target: PrepStatus) -> bool {
        matches!(
            (self, target),
            (Self::Queued, Self::Processing)
                | (Self::Queued, Self::Ready)
                | (Self::Processing, Self::Ready)
                | (Self::Ready, Self::Picked)
        )
    }
}

impl Display for PrepStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch the kitchen was asked to prepare for one cook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepRequest {
    pub id: String,
    pub cook_id: String,
    pub food: FoodSnapshot,
    pub quantity_to_prepare: u32,
    #[serde(default = "default_prep_status")]
    pub status: PrepStatus,
    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_prep_status() -> PrepStatus {
    PrepStatus::Queued
}

impl PrepRequest {
    pub fn new(
        id: impl Into<String>,
        cook_id: impl Into<String>,
        food: FoodSnapshot,
        quantity_to_prepare: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            cook_id: cook_id.into(),
            food,
            quantity_to_prepare,
            status: PrepStatus::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch_updated_at(&mut self) {
        self.updated_at = Utc::now();
    }
}
