//! Prep request lifecycle: supervisor -> cook path.
//!
//! queued -> processing -> ready -> picked. `picked` consumes the request:
//! it leaves the active store and its id is tombstoned so later calls get
//! `AlreadyTerminal`, not `NotFound`.

use crate::error::TransitionError;
use crate::workflow::Workflow;
use serde::Deserialize;
use thela_core::{
    Actor, ActorRole, FoodSnapshot, PrepRequest, PrepStatus, new_prep_request_id,
    require_id_token, require_positive_quantity,
};
use thela_store::WorkflowAction;
use tracing::warn;

/// Input to `Workflow::create_prep`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrep {
    pub cook_id: String,
    pub food_item_id: String,
    pub quantity_to_prepare: u32,
}

/// Input to `Workflow::transition_prep`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrepTransition {
    pub request_id: String,
    pub target: PrepStatus,
    /// The status the caller last saw; when present and out of date the
    /// transition fails with `StaleState` before any legality check.
    #[serde(default)]
    pub observed_status: Option<PrepStatus>,
}

impl Workflow {
    /// A supervisor queues a batch for one cook, snapshotting the food item.
    pub fn create_prep(
        &self,
        actor: &Actor,
        request: CreatePrep,
    ) -> Result<PrepRequest, TransitionError> {
        if actor.role != ActorRole::Supervisor {
            return Err(TransitionError::RoleNotPermitted {
                role: actor.role,
                action: "create prep requests",
            });
        }
        require_id_token("cook_id", &request.cook_id)?;
        require_id_token("food_item_id", &request.food_item_id)?;
        require_positive_quantity("quantity_to_prepare", request.quantity_to_prepare)?;
        let item = self
            .ledger()
            .item(&request.food_item_id)
            .ok_or_else(|| TransitionError::UnknownItem(request.food_item_id.clone()))?;

        let record = PrepRequest::new(
            new_prep_request_id(),
            request.cook_id,
            FoodSnapshot::of(&item),
            request.quantity_to_prepare,
        );
        self.requests().insert_prep(record.clone());
        self.publish(
            actor,
            WorkflowAction::PrepCreated {
                request_id: record.id.clone(),
                cook_id: record.cook_id.clone(),
                quantity: record.quantity_to_prepare,
            },
        );
        Ok(record)
    }

    /// Drive one prep request along its status graph.
    pub fn transition_prep(
        &self,
        actor: &Actor,
        transition: PrepTransition,
    ) -> Result<PrepRequest, TransitionError> {
        if self.requests().is_prep_consumed(&transition.request_id) {
            return Err(TransitionError::AlreadyTerminal {
                id: transition.request_id,
                status: PrepStatus::Picked.as_str().to_string(),
            });
        }
        let entry = self
            .requests()
            .prep_entry(&transition.request_id)
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
        check_prep_gate(actor, &request, transition.target)?;

        request.status = transition.target;
        request.touch_updated_at();
        let updated = request.clone();
        drop(request);

        if transition.target == PrepStatus::Picked
            && let Err(err) = self.requests().consume_prep(&updated.id)
        {
            // The entry was locked while we set `picked`; a missing entry here
            // means another consumer won between unlock and removal.
            warn!(request_id = %updated.id, %err, "picked request already consumed");
        }

        self.publish(
            actor,
            WorkflowAction::PrepTransitioned {
                request_id: updated.id.clone(),
                from: current,
                to: updated.status,
            },
        );
        Ok(updated)
    }

    /// Edit the batch size of a non-terminal prep request. Does not change
    /// status.
    pub fn set_prep_quantity(
        &self,
        actor: &Actor,
        request_id: &str,
        quantity: u32,
    ) -> Result<PrepRequest, TransitionError> {
        require_positive_quantity("quantity_to_prepare", quantity)?;
        if self.requests().is_prep_consumed(request_id) {
            return Err(TransitionError::AlreadyTerminal {
                id: request_id.to_string(),
                status: PrepStatus::Picked.as_str().to_string(),
            });
        }
        let entry = self
            .requests()
            .prep_entry(request_id)
            .ok_or_else(|| TransitionError::NotFound(request_id.to_string()))?;
        let mut request = entry.lock().unwrap_or_else(|e| e.into_inner());

        if request.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                id: request.id.clone(),
                status: request.status.as_str().to_string(),
            });
        }
        if !is_assigned_cook(actor, &request) && actor.role != ActorRole::Supervisor {
            return Err(TransitionError::RoleNotPermitted {
                role: actor.role,
                action: "edit prep quantities",
            });
        }

        request.quantity_to_prepare = quantity;
        request.touch_updated_at();
        let updated = request.clone();
        drop(request);

        self.publish(
            actor,
            WorkflowAction::PrepQuantityChanged {
                request_id: updated.id.clone(),
                quantity,
            },
        );
        Ok(updated)
    }
}

fn is_assigned_cook(actor: &Actor, request: &PrepRequest) -> bool {
    actor.role == ActorRole::Cook && actor.id == request.cook_id
}

/// Who may drive which prep transition.
fn check_prep_gate(
    actor: &Actor,
    request: &PrepRequest,
    target: PrepStatus,
) -> Result<(), TransitionError> {
    match target {
        PrepStatus::Processing | PrepStatus::Ready => {
            if !is_assigned_cook(actor, request) {
                return Err(TransitionError::RoleNotPermitted {
                    role: actor.role,
                    action: "work the prep queue",
                });
            }
        }
        PrepStatus::Picked => {
            if !is_assigned_cook(actor, request) && actor.role != ActorRole::Supervisor {
                return Err(TransitionError::RoleNotPermitted {
                    role: actor.role,
                    action: "pick up prepared batches",
                });
            }
        }
        PrepStatus::Queued => {}
    }
    Ok(())
}
