//! Actor-scoped read views, used purely for rendering.
//!
//! Views are snapshots in deterministic id order; they are not part of the
//! transition contract and take no entry locks beyond per-record reads.

use crate::workflow::Workflow;
use serde::Serialize;
use thela_core::{PrepRequest, RefillRequest, RefillStatus};

/// Pending-approval counters for the super-admin shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub pending_refills: usize,
    pub queued_preps: usize,
}

impl Workflow {
    /// Refill requests raised by one rider.
    pub fn refills_for_rider(&self, rider_id: &str) -> Vec<RefillRequest> {
        self.requests()
            .refills()
            .into_iter()
            .filter(|request| request.rider_id == rider_id)
            .collect()
    }

    /// Refill requests routed to one coordinator.
    pub fn refills_for_coordinator(&self, coordinator_id: &str) -> Vec<RefillRequest> {
        self.requests()
            .refills()
            .into_iter()
            .filter(|request| {
                request.assigned_coordinator_id.as_deref() == Some(coordinator_id)
            })
            .collect()
    }

    /// Refill requests awaiting triage.
    pub fn pending_refills(&self) -> Vec<RefillRequest> {
        self.requests()
            .refills()
            .into_iter()
            .filter(|request| request.status == RefillStatus::Pending)
            .collect()
    }

    /// Active prep requests queued for one cook.
    pub fn preps_for_cook(&self, cook_id: &str) -> Vec<PrepRequest> {
        self.requests()
            .preps()
            .into_iter()
            .filter(|request| request.cook_id == cook_id)
            .collect()
    }

    /// Counters behind `GET /api/admin/requests/count`.
    pub fn pending_counts(&self) -> PendingCounts {
        PendingCounts {
            pending_refills: self.pending_refills().len(),
            queued_preps: self
                .requests()
                .preps()
                .iter()
                .filter(|request| request.status == thela_core::PrepStatus::Queued)
                .count(),
        }
    }
}
