use lifecycle_core_api::{Action, AttributeValue, LifecycleContext, LifecycleError, LifecycleResult};
use tracing::{debug, info, warn};

use crate::lifecycle::behaviors::SaveEvent;
use crate::lifecycle::orchestrator::LifecycleOrchestrator;
use crate::lifecycle::permission::CheckMode;
use crate::models::entity::Entity;

/// Soft-delete state of an entity whose type declares the flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteState {
    Active,
    Deleted,
}

impl SoftDeleteState {
    /// `None` when the entity type has no soft-delete flag
    pub fn of(entity: &Entity) -> Option<Self> {
        entity.soft_delete_flag().map(|deleted| {
            if deleted {
                SoftDeleteState::Deleted
            } else {
                SoftDeleteState::Active
            }
        })
    }

    fn flag(self) -> bool {
        self == SoftDeleteState::Deleted
    }
}

/// Result of a soft-delete or restore call that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteOutcome {
    /// The flag was written; the entity is now in this state
    Applied(SoftDeleteState),
    /// The type has no soft-delete flag; nothing was checked or written
    Unsupported,
}

impl LifecycleOrchestrator {
    /// Moves an active record to the deleted state, writing only the flag
    pub async fn soft_delete(&self, entity: &mut Entity, ctx: &LifecycleContext) -> LifecycleResult<SoftDeleteOutcome> {
        self.transition(entity, SoftDeleteState::Deleted, ctx).await
    }

    /// Moves a deleted record back to the active state, writing only the flag
    pub async fn restore(&self, entity: &mut Entity, ctx: &LifecycleContext) -> LifecycleResult<SoftDeleteOutcome> {
        self.transition(entity, SoftDeleteState::Active, ctx).await
    }

    async fn transition(
        &self,
        entity: &mut Entity,
        target: SoftDeleteState,
        ctx: &LifecycleContext,
    ) -> LifecycleResult<SoftDeleteOutcome> {
        let schema = entity.schema().clone();
        let Some(flag) = schema.soft_delete_attribute() else {
            debug!(
                entity_type = schema.type_name(),
                entity_id = %entity.id(),
                "type has no soft-delete flag, nothing to do"
            );
            return Ok(SoftDeleteOutcome::Unsupported);
        };

        let action = match target {
            SoftDeleteState::Deleted => Action::SoftDelete,
            SoftDeleteState::Active => Action::Restore,
        };
        self.gate.can(entity, action, ctx, CheckMode::Loud).await?;

        let previous = entity.get(flag).cloned();
        entity.set(flag, target.flag())?;
        let fields = vec![flag.to_string()];
        if let Err(err) = self.save(entity, SaveEvent::update(Some(fields.as_slice())), ctx).await {
            // an audit failure comes after the row was written
            if !matches!(err, LifecycleError::AuditWriteFailure { .. }) {
                warn!(
                    entity_type = schema.type_name(),
                    entity_id = %entity.id(),
                    action = %action,
                    error = %err,
                    "soft-delete state not written, flag reverted"
                );
                revert_flag(entity, flag, previous);
            }
            return Err(err);
        }

        info!(
            entity_type = schema.type_name(),
            entity_id = %entity.id(),
            action = %action,
            "soft-delete state changed"
        );
        Ok(SoftDeleteOutcome::Applied(target))
    }
}

fn revert_flag(entity: &mut Entity, flag: &str, previous: Option<AttributeValue>) {
    let attributes = entity.attributes_mut();
    match previous {
        Some(value) => {
            attributes.insert(flag.to_string(), value);
        }
        None => {
            attributes.remove(flag);
        }
    }
}
