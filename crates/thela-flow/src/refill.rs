//! Refill request lifecycle: rider -> coordinator path.
//!
//! pending -> forwarded -> in-progress -> delivered, with rejected as the
//! early exit. Transitions are check-then-set under the request's lock; a
//! caller that supplies its observed status gets `StaleState` instead of a
//! silent overwrite when it lost a race.

use crate::error::TransitionError;
use crate::workflow::Workflow;
use serde::Deserialize;
use thela_core::{
    Actor, ActorRole, RefillRequest, RefillStatus, ValidationError, cart_item_id,
    new_refill_request_id, require_id_token, require_positive_quantity,
};
use thela_store::WorkflowAction;

/// Input to `Workflow::create_refill`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRefill {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

/// Input to `Workflow::transition_refill`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefillTransition {
    pub request_id: String,
    pub target: RefillStatus,
    #[serde(default)]
    pub coordinator_id: Option<String>,
    /// The status the caller last saw; when present and out of date the
    /// transition fails with `StaleState` before any legality check.
    #[serde(default)]
    pub observed_status: Option<RefillStatus>,
}

impl Workflow {
    /// A rider asks for cart stock of one item to be topped up.
    pub fn create_refill(
        &self,
        actor: &Actor,
        request: CreateRefill,
    ) -> Result<RefillRequest, TransitionError> {
        if actor.role != ActorRole::Rider {
            return Err(TransitionError::RoleNotPermitted {
                role: actor.role,
                action: "create refill requests",
            });
        }
        require_id_token("item_id", &request.item_id)?;
        require_positive_quantity("quantity", request.quantity)?;
        if self.ledger().item(&request.item_id).is_none() {
            return Err(TransitionError::UnknownItem(request.item_id));
        }

        let mut record = RefillRequest::new(
            new_refill_request_id(),
            actor.id.clone(),
            request.item_id,
            request.quantity,
            request.reason,
        );
        if let Some(priority) = request.priority {
            record.priority = priority;
        }
        self.requests().insert_refill(record.clone());
        self.publish(
            actor,
            WorkflowAction::RefillCreated {
                request_id: record.id.clone(),
                rider_id: record.rider_id.clone(),
                item_id: record.item_id.clone(),
                quantity: record.quantity,
            },
        );
        Ok(record)
    }

    /// Drive one refill request along its status graph.
    pub fn transition_refill(
        &self,
        actor: &Actor,
        transition: RefillTransition,
    ) -> Result<RefillRequest, TransitionError> {
        let entry = self
            .requests()
            .refill_entry(&transition.request_id)
            .ok_or_else(|| TransitionError::NotFound(transition.request_id.clone()))?;
        let mut request = entry.lock().unwrap_or_else(|e| e.into_inner());
        let current = request.status;

        if current.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: request.id.clone(),
                status: current.as_str().to_string(),
            });
        }
        if let Some(observed) = transition.observed_status
            && observed != current
        {
            return Err(TransitionError::StaleState {
                observed: observed.as_str().to_string(),
                current: current.as_str().to_string(),
            });
        }
        if !current.allows(transition.target) {
            return Err(TransitionError::IllegalTransition {
                from: current.as_str().to_string(),
                to: transition.target.as_str().to_string(),
            });
        }
        self.check_refill_gate(actor, &request, transition.target)?;

        let mut coordinator_for_event = None;
        match transition.target {
            RefillStatus::Forwarded => {
                let coordinator_id = transition
                    .coordinator_id
                    .ok_or(ValidationError::MissingCoordinator)?;
                require_id_token("coordinator_id", &coordinator_id)?;
                request.assigned_coordinator_id = Some(coordinator_id.clone());
                coordinator_for_event = Some(coordinator_id);
            }
            RefillStatus::InProgress => {
                // Register the inbound units so the delivery release has a
                // matching expectation on the rider's cart entry.
                let cart = cart_item_id(&request.rider_id, &request.item_id);
                self.ledger().expect_delivery(&cart, request.quantity)?;
            }
            RefillStatus::Delivered => {
                // The point at which the rider's local stock is replenished.
                let cart = cart_item_id(&request.rider_id, &request.item_id);
                self.ledger().release(&cart, request.quantity)?;
            }
            RefillStatus::Rejected | RefillStatus::Pending => {}
        }

        request.status = transition.target;
        request.touch_updated_at();
        let updated = request.clone();
        drop(request);

        self.publish(
            actor,
            WorkflowAction::RefillTransitioned {
                request_id: updated.id.clone(),
                from: current,
                to: updated.status,
                coordinator_id: coordinator_for_event,
            },
        );
        Ok(updated)
    }

    /// Who may drive which refill transition.
    fn check_refill_gate(
        &self,
        actor: &Actor,
        request: &RefillRequest,
        target: RefillStatus,
    ) -> Result<(), TransitionError> {
        match target {
            RefillStatus::Forwarded | RefillStatus::Rejected => {
                if !matches!(actor.role, ActorRole::Supervisor | ActorRole::Cook) {
                    return Err(TransitionError::RoleNotPermitted {
                        role: actor.role,
                        action: "triage refill requests",
                    });
                }
            }
            RefillStatus::InProgress | RefillStatus::Delivered => {
                let assigned = request.assigned_coordinator_id.as_deref();
                if actor.role != ActorRole::RefillCoordinator || assigned != Some(actor.id.as_str())
                {
                    return Err(TransitionError::RoleNotPermitted {
                        role: actor.role,
                        action: "fulfill refill requests",
                    });
                }
            }
            RefillStatus::Pending => {}
        }
        Ok(())
    }
}
