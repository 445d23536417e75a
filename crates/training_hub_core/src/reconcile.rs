//! crates/training_hub_core/src/reconcile.rs
//!
//! The assignment reconciler: makes a trainee's set of assigned modules match
//! a desired set using one batch delete and one batch insert.

use crate::domain::Assignment;
use crate::ports::{AssignmentRepository, PortError, PortResult};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{error, info};
use uuid::Uuid;

//=========================================================================================
// Validated Input
//=========================================================================================

/// The complete desired assignment set for one trainee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentSelection {
    trainee_id: Uuid,
    instructor_id: Uuid,
    module_ids: BTreeSet<Uuid>,
}

impl AssignmentSelection {
    /// Validates a reconciliation request.
    ///
    /// Duplicate module ids are accepted and collapse into one entry.
    pub fn new(
        trainee_id: Option<Uuid>,
        instructor_id: Option<Uuid>,
        module_ids: &[Uuid],
    ) -> PortResult<Self> {
        let trainee_id = trainee_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| PortError::InvalidInput("traineeId is required".to_string()))?;
        let instructor_id = instructor_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| PortError::InvalidInput("instructorId is required".to_string()))?;

        if module_ids.is_empty() {
            return Err(PortError::InvalidInput(
                "moduleIds must contain at least one module".to_string(),
            ));
        }
        if module_ids.iter().any(Uuid::is_nil) {
            return Err(PortError::InvalidInput(
                "moduleIds must not contain empty entries".to_string(),
            ));
        }

        Ok(Self {
            trainee_id,
            instructor_id,
            module_ids: module_ids.iter().copied().collect(),
        })
    }

    pub fn trainee_id(&self) -> Uuid {
        self.trainee_id
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn module_ids(&self) -> &BTreeSet<Uuid> {
        &self.module_ids
    }
}

//=========================================================================================
// Planning
//=========================================================================================

/// The minimal delta between a trainee's current and desired module sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_add: Vec<Uuid>,
    pub to_remove: Vec<Uuid>,
}

impl ReconciliationPlan {
    pub fn between(current: &BTreeSet<Uuid>, desired: &BTreeSet<Uuid>) -> Self {
        Self {
            to_add: desired.difference(current).copied().collect(),
            to_remove: current.difference(desired).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Counts of records written by one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub removed: usize,
}

//=========================================================================================
// Applying
//=========================================================================================

/// Reconciles a trainee's assignments against `selection`.
///
/// The read, delete and insert all run in one assignment transaction, so
/// concurrent runs for the same trainee serialize and a failed insert rolls
/// back the delete. Re-running after any failure converges on the same result.
pub async fn reconcile_assignments<R>(
    repo: &R,
    selection: &AssignmentSelection,
) -> PortResult<ReconcileOutcome>
where
    R: AssignmentRepository + ?Sized,
{
    let trainee_id = selection.trainee_id();
    let mut tx = repo.begin_assignment_transaction(trainee_id).await?;

    let current = tx.current_module_ids().await?;
    let plan = ReconciliationPlan::between(&current, selection.module_ids());
    if plan.is_empty() {
        info!(%trainee_id, "assignments already reconciled");
        return Ok(ReconcileOutcome::default());
    }

    if !plan.to_remove.is_empty() {
        tx.remove_modules(&plan.to_remove).await?;
    }

    if !plan.to_add.is_empty() {
        let now = Utc::now();
        let new_assignments: Vec<Assignment> = plan
            .to_add
            .iter()
            .map(|module_id| {
                Assignment::new(*module_id, trainee_id, selection.instructor_id(), now)
            })
            .collect();

        if let Err(e) = tx.insert_assignments(&new_assignments).await {
            if !plan.to_remove.is_empty() {
                error!(
                    %trainee_id,
                    pending_removals = plan.to_remove.len(),
                    pending_additions = plan.to_add.len(),
                    "partial reconciliation rolled back: insert failed after delete: {}",
                    e
                );
            }
            return Err(e);
        }
    }

    tx.commit().await?;

    let outcome = ReconcileOutcome {
        added: plan.to_add.len(),
        removed: plan.to_remove.len(),
    };
    info!(
        %trainee_id,
        added = outcome.added,
        removed = outcome.removed,
        "assignments reconciled"
    );
    Ok(outcome)
}
