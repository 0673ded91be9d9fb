use lifecycle_core_api::{ConfigurationError, LifecycleContext, LifecycleError, LifecycleResult};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, warn};

use crate::lifecycle::orchestrator::{hydrate, storage_error, LifecycleOrchestrator};
use crate::lifecycle::permission::CheckMode;
use crate::models::entity::Entity;
use crate::models::schema::{OnDelete, RelationDescriptor};
use crate::repository::entity_store::{Condition, StoreTransaction};

type DeleteFuture<'a> = Pin<Box<dyn Future<Output = LifecycleResult<()>> + Send + 'a>>;

impl LifecycleOrchestrator {
    /// Physically deletes a record together with its cascade children.
    ///
    /// Everything runs in one transaction: the permission check, the restrict
    /// relations, the children (each through this same sequence) and finally
    /// the record itself. Any failure rolls the whole call back.
    pub async fn delete(&self, entity: &mut Entity, ctx: &LifecycleContext) -> LifecycleResult<()> {
        let tx = self
            .store
            .begin()
            .await
            .map_err(|cause| storage_error("begin", entity.type_name(), Some(entity.id()), cause))?;

        match self.delete_in(&*tx, entity, ctx).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|cause| storage_error("commit", entity.type_name(), Some(entity.id()), cause))?;
                entity.mark_detached();
                info!(entity_type = entity.type_name(), entity_id = %entity.id(), "entity deleted");
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        entity_type = entity.type_name(),
                        entity_id = %entity.id(),
                        error = %rollback,
                        "rollback failed"
                    );
                }
                warn!(
                    entity_type = entity.type_name(),
                    entity_id = %entity.id(),
                    error = %err,
                    "delete rolled back"
                );
                Err(err)
            }
        }
    }

    /// The delete sequence for one record inside an open transaction
    fn delete_in<'a>(
        &'a self,
        tx: &'a dyn StoreTransaction,
        entity: &'a Entity,
        ctx: &'a LifecycleContext,
    ) -> DeleteFuture<'a> {
        Box::pin(async move {
            let schema = entity.schema();
            debug!(entity_type = schema.type_name(), entity_id = %entity.id(), "before_delete");

            self.gate.can_delete(entity, ctx, CheckMode::Loud).await?;
            for behavior in schema.behaviors() {
                behavior.before_delete(entity, ctx)?;
            }

            if schema.checks_relations() {
                for relation in schema.relations().iter().filter(|r| r.on_delete() == OnDelete::Restrict) {
                    let dependents = self.resolve(tx, entity, relation).await?;
                    if !dependents.is_empty() {
                        warn!(
                            entity_type = schema.type_name(),
                            entity_id = %entity.id(),
                            relation = relation.name(),
                            dependents = dependents.len(),
                            "delete blocked by dependent records"
                        );
                        return Err(LifecycleError::HasDependents {
                            entity_type: schema.type_name().to_string(),
                            entity_id: entity.id(),
                            relation: relation.name().to_string(),
                        });
                    }
                }
            }

            for relation in schema.relations().iter().filter(|r| r.on_delete() == OnDelete::Cascade) {
                let children = self.resolve(tx, entity, relation).await?;
                for child in children {
                    let child = hydrate(child, ctx);
                    debug!(
                        entity_type = schema.type_name(),
                        entity_id = %entity.id(),
                        relation = relation.name(),
                        child_id = %child.id(),
                        "cascading delete"
                    );
                    self.delete_in(tx, &child, ctx)
                        .await
                        .map_err(|cause| cascade_failure(entity, cause))?;
                }
            }

            match tx.delete(entity).await {
                Ok(0) => Err(LifecycleError::NotFound {
                    entity_type: schema.type_name().to_string(),
                    entity_id: entity.id(),
                }),
                Ok(_) => Ok(()),
                Err(cause) => Err(storage_error("delete", schema.type_name(), Some(entity.id()), cause)),
            }
        })
    }

    /// Records of a relation that point at `entity`
    async fn resolve(
        &self,
        tx: &dyn StoreTransaction,
        entity: &Entity,
        relation: &RelationDescriptor,
    ) -> LifecycleResult<Vec<Entity>> {
        let target = relation.target();
        if !target.has_attribute(relation.foreign_key()) {
            return Err(ConfigurationError::MisconfiguredRelation {
                entity_type: entity.type_name().to_string(),
                name: relation.name().to_string(),
                reason: format!(
                    "{} declares no attribute '{}'",
                    target.type_name(),
                    relation.foreign_key()
                ),
            }
            .into());
        }

        tx.find(target, &[Condition::eq(relation.foreign_key(), entity.id())])
            .await
            .map_err(|cause| storage_error("find", target.type_name(), None, cause))
    }
}

/// Wraps a child's failure in the parent's cascade failure.
///
/// Configuration defects stay unwrapped, and a failure already wrapped by a
/// deeper level is passed up as is.
fn cascade_failure(parent: &Entity, cause: LifecycleError) -> LifecycleError {
    match cause {
        LifecycleError::Configuration(_) | LifecycleError::CascadeFailure { .. } => cause,
        cause => LifecycleError::CascadeFailure {
            entity_type: parent.type_name().to_string(),
            entity_id: parent.id(),
            cause: Box::new(cause),
        },
    }
}
