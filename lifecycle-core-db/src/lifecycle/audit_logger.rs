use lifecycle_core_api::{AttributeValue, LifecycleContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::audit::{AuditLogModel, AuditValues};
use crate::models::auditable::Auditable;
use crate::models::entity::Entity;
use crate::repository::audit_log_repository::AuditLogRepository;
use crate::repository::entity_store::StoreResult;

/// Before and after values of the attributes a save actually changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditDiff {
    pub before: AuditValues,
    pub after: AuditValues,
}

impl AuditDiff {
    /// Compares the pre-save values of the changed attributes with the
    /// entity's current values. Datetime attributes are never recorded.
    pub fn compute(entity: &Entity, previous: &BTreeMap<String, AttributeValue>) -> Self {
        let mut diff = Self::default();
        for (attribute, old) in previous {
            if entity.schema().is_datetime_attribute(attribute) {
                continue;
            }
            let current = entity.get(attribute).unwrap_or(&AttributeValue::Null);
            if old != current {
                diff.before.insert(attribute.clone(), old.to_json());
                diff.after.insert(attribute.clone(), current.to_json());
            }
        }
        diff
    }

    /// An entry is written only when both sides hold something
    pub fn is_recordable(&self) -> bool {
        !self.before.is_empty() && !self.after.is_empty()
    }
}

/// Writes one audit entry per save that changed a non-datetime attribute
#[derive(Clone)]
pub struct AuditLogger {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditLogger {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn AuditLogRepository> {
        &self.repository
    }

    /// Records the changes of a finished save.
    ///
    /// # Returns
    /// * `Ok(Some(entry))` - The entry that was written
    /// * `Ok(None)` - Nothing qualifying changed, nothing was written
    /// * `Err` - The repository failed to store the entry
    pub async fn record(
        &self,
        entity: &Entity,
        previous: &BTreeMap<String, AttributeValue>,
        ctx: &LifecycleContext,
    ) -> StoreResult<Option<AuditLogModel>> {
        let diff = AuditDiff::compute(entity, previous);
        if !diff.is_recordable() {
            debug!(
                entity_type = entity.type_name(),
                entity_id = %entity.id(),
                "no auditable changes"
            );
            return Ok(None);
        }

        let entry = AuditLogModel::new(ctx.actor_id(), entity.id(), diff.before, diff.after, ctx.now());
        let stored = self.repository.create(entity.audit_log_table(), &entry).await?;

        info!(
            entity_type = entity.type_name(),
            entity_id = %entity.id(),
            audit_id = %stored.id(),
            attributes = stored.after().len(),
            "audit entry written"
        );
        Ok(Some(stored))
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::MemoryAuditLogRepository;
    use crate::models::schema::EntitySchema;
    use lifecycle_core_api::{AttributeType, UNKNOWN_ACTOR};
    use serde_json::json;
    use uuid::Uuid;

    fn loaded() -> Entity {
        let schema = EntitySchema::builder("Article", "article")
            .attribute("a", AttributeType::Integer)
            .attribute("b", AttributeType::String)
            .attribute("published_at", AttributeType::DateTime)
            .build()
            .unwrap();
        let values = [
            ("a".to_string(), AttributeValue::Integer(1)),
            ("b".to_string(), AttributeValue::text("x")),
            ("published_at".to_string(), AttributeValue::text("2024-01-01 00:00:00")),
        ]
        .into_iter()
        .collect();
        Entity::from_storage(schema, Uuid::new_v4(), values)
    }

    fn previous(entity: &Entity, attributes: &[&str]) -> BTreeMap<String, AttributeValue> {
        attributes
            .iter()
            .map(|a| (a.to_string(), entity.old_value(a)))
            .collect()
    }

    #[test]
    fn test_unchanged_and_datetime_attributes_are_excluded() {
        let mut entity = loaded();
        let changed = previous(&entity, &["a", "b", "published_at"]);
        entity.set("a", 2).unwrap();
        entity.set("b", "x").unwrap();
        entity.set("published_at", "2024-02-02 00:00:00").unwrap();

        let diff = AuditDiff::compute(&entity, &changed);

        let before: AuditValues = [("a".to_string(), json!(1))].into_iter().collect();
        let after: AuditValues = [("a".to_string(), json!(2))].into_iter().collect();
        assert_eq!(diff.before, before);
        assert_eq!(diff.after, after);
        assert!(diff.is_recordable());
    }

    #[tokio::test]
    async fn test_only_datetime_changes_write_nothing() {
        let repo = Arc::new(MemoryAuditLogRepository::new());
        let logger = AuditLogger::new(repo.clone());
        let mut entity = loaded();
        let changed = previous(&entity, &["published_at"]);
        entity.set("published_at", "2024-02-02 00:00:00").unwrap();

        let written = logger
            .record(&entity, &changed, &LifecycleContext::utc(None))
            .await
            .unwrap();

        assert!(written.is_none());
        assert!(repo.entries("article_log").is_empty());
    }

    #[tokio::test]
    async fn test_entry_carries_actor_and_target() {
        let repo = Arc::new(MemoryAuditLogRepository::new());
        let logger = AuditLogger::new(repo.clone());
        let mut entity = loaded();
        let changed = previous(&entity, &["a"]);
        entity.set("a", 5).unwrap();

        let entry = logger
            .record(&entity, &changed, &LifecycleContext::utc(None))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entry.actor_id(), UNKNOWN_ACTOR);
        assert_eq!(entry.target_id(), entity.id());
        assert_eq!(repo.entries("article_log").len(), 1);
    }

    #[tokio::test]
    async fn test_repository_failure_is_returned() {
        let repo = Arc::new(MemoryAuditLogRepository::new());
        repo.fail_writes(true);
        let logger = AuditLogger::new(repo.clone());
        let mut entity = loaded();
        let changed = previous(&entity, &["a"]);
        entity.set("a", 5).unwrap();

        assert!(logger
            .record(&entity, &changed, &LifecycleContext::utc(None))
            .await
            .is_err());
    }
}
