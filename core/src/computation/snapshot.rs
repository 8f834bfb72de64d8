//! Serializable images of computations
//!
//! A snapshot carries the whole interpreter state, so a suspended
//! computation can be written out in one process and resumed in another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Computation, ComputationError, ComputationState, Limits};
use crate::executor::{Val, VM};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub template: String,
    pub version_hash: String,
    pub state: ComputationState,
    pub vm: VM,
    pub last_yielded: Option<Val>,
    pub completion_value: Option<Val>,
    pub saved_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, ComputationError> {
        serde_json::to_string_pretty(self).map_err(|e| ComputationError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ComputationError> {
        serde_json::from_str(json).map_err(|e| ComputationError::Snapshot(e.to_string()))
    }
}

impl Computation {
    /// Capture the computation's current state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id,
            template: self.template.clone(),
            version_hash: self.version_hash.clone(),
            state: self.state,
            vm: self.vm.clone(),
            last_yielded: self.last_yielded.clone(),
            completion_value: self.completion_value.clone(),
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a computation from a snapshot
    ///
    /// The snapshot's state must agree with its interpreter: a suspended
    /// computation must be parked at a `yield`, a created one must not be.
    pub fn restore(snapshot: Snapshot, limits: Limits) -> Result<Self, ComputationError> {
        let consistent = match snapshot.state {
            ComputationState::Created => !snapshot.vm.is_suspended() && !snapshot.vm.is_finished(),
            ComputationState::Suspended => snapshot.vm.is_suspended(),
            ComputationState::Completed | ComputationState::Failed => snapshot.vm.is_finished(),
            ComputationState::Running => false,
        };
        if !consistent {
            return Err(ComputationError::Snapshot(format!(
                "state '{}' does not match the saved interpreter",
                snapshot.state
            )));
        }

        tracing::debug!(
            id = %snapshot.id,
            state = %snapshot.state,
            saved_at = %snapshot.saved_at,
            "Computation restored"
        );

        Ok(Self {
            id: snapshot.id,
            template: snapshot.template,
            version_hash: snapshot.version_hash,
            state: snapshot.state,
            vm: snapshot.vm,
            last_yielded: snapshot.last_yielded,
            completion_value: snapshot.completion_value,
            injected: None,
            limits,
        })
    }
}
