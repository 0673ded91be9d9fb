use lifecycle_core_api::{
    AttributeValue, BoxError, ConfigurationError, LifecycleContext, LifecycleError, LifecycleResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lifecycle::audit_logger::AuditLogger;
use crate::lifecycle::behaviors::SaveEvent;
use crate::lifecycle::permission::{Authorizer, CheckMode, PermissionGate};
use crate::lifecycle::rules::run_rules;
use crate::lifecycle::timezone::TimezoneNormalizer;
use crate::models::audit::{AuditLogModel, AuditLogQuery};
use crate::models::auditable::Auditable;
use crate::models::entity::Entity;
use crate::models::schema::EntitySchema;
use crate::repository::audit_log_repository::AuditLogRepository;
use crate::repository::entity_store::{Condition, TransactionalStore};
use crate::repository::pagination::{Page, PageRequest};

/// Which records a list query returns, by soft-delete state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    All,
    #[default]
    NotDeleted,
    Deleted,
}

/// Sequences the lifecycle hooks around every load, save and delete.
///
/// Save order: `before_validate` behaviors, validation, `before_save`
/// behaviors, conversion to the storage zone, the write, refresh, conversion
/// back to the user zone, `after_save` behaviors, the audit entry.
///
/// # Example
/// ```ignore
/// let orchestrator = LifecycleOrchestrator::new(store, audit_repository, authorizer);
/// let ctx = config.context_for(Some(user_id), Arc::new(SystemClock))?;
///
/// let mut article = Entity::new(article_schema.clone());
/// article.set("title", "Hello")?;
/// orchestrator.create(&mut article, &ctx).await?;
/// ```
pub struct LifecycleOrchestrator {
    pub(crate) store: Arc<dyn TransactionalStore>,
    pub(crate) gate: PermissionGate,
    pub(crate) audit: AuditLogger,
}

impl LifecycleOrchestrator {
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        audit_repository: Arc<dyn AuditLogRepository>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            store,
            gate: PermissionGate::new(authorizer),
            audit: AuditLogger::new(audit_repository),
        }
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit
    }

    /// Loads one record in user form
    pub async fn find(
        &self,
        schema: &Arc<EntitySchema>,
        id: Uuid,
        ctx: &LifecycleContext,
    ) -> LifecycleResult<Option<Entity>> {
        let loaded = self
            .store
            .load(schema, id)
            .await
            .map_err(|cause| storage_error("load", schema.type_name(), Some(id), cause))?;

        Ok(loaded.map(|entity| hydrate(entity, ctx)))
    }

    /// Loads every record of a type in the given soft-delete scope
    pub async fn find_all(
        &self,
        schema: &Arc<EntitySchema>,
        scope: Scope,
        ctx: &LifecycleContext,
    ) -> LifecycleResult<Vec<Entity>> {
        let conditions = match (schema.soft_delete_attribute(), scope) {
            (None, Scope::Deleted) => return Ok(Vec::new()),
            (None, _) | (_, Scope::All) => Vec::new(),
            (Some(flag), Scope::NotDeleted) => vec![Condition::eq(flag, false)],
            (Some(flag), Scope::Deleted) => vec![Condition::eq(flag, true)],
        };

        let entities = self
            .store
            .find(schema, &conditions)
            .await
            .map_err(|cause| storage_error("find", schema.type_name(), None, cause))?;

        Ok(entities.into_iter().map(|entity| hydrate(entity, ctx)).collect())
    }

    /// Id and `label_attribute` of every record in `scope`, in store order
    pub async fn list_all(
        &self,
        schema: &Arc<EntitySchema>,
        label_attribute: &str,
        scope: Scope,
        ctx: &LifecycleContext,
    ) -> LifecycleResult<Vec<(Uuid, AttributeValue)>> {
        if !schema.has_attribute(label_attribute) && !schema.is_transient(label_attribute) {
            return Err(ConfigurationError::UnknownAttribute {
                entity_type: schema.type_name().to_string(),
                attribute: label_attribute.to_string(),
            }
            .into());
        }

        let entities = self.find_all(schema, scope, ctx).await?;
        Ok(entities
            .into_iter()
            .map(|entity| {
                let label = entity.get(label_attribute).cloned().unwrap_or(AttributeValue::Null);
                (entity.id(), label)
            })
            .collect())
    }

    /// Inserts a new record; requires the create permission
    pub async fn create(&self, entity: &mut Entity, ctx: &LifecycleContext) -> LifecycleResult<()> {
        self.gate.can_create(entity, ctx, CheckMode::Loud).await?;
        self.save(entity, SaveEvent::insert(), ctx).await
    }

    /// Writes every changed attribute of a saved record; requires the update permission
    pub async fn update(&self, entity: &mut Entity, ctx: &LifecycleContext) -> LifecycleResult<()> {
        self.gate.can_update(entity, ctx, CheckMode::Loud).await?;
        self.save(entity, SaveEvent::update(None), ctx).await
    }

    /// Writes only the listed attributes, validating only the rules on them
    pub async fn update_fields(
        &self,
        entity: &mut Entity,
        fields: &[&str],
        ctx: &LifecycleContext,
    ) -> LifecycleResult<()> {
        self.gate.can_update(entity, ctx, CheckMode::Loud).await?;
        let fields = declared_fields(entity, fields)?;
        self.save(entity, SaveEvent::update(Some(fields.as_slice())), ctx).await
    }

    /// Audit entries of one record, newest first
    pub async fn audit_trail(&self, entity: &Entity, page: PageRequest) -> LifecycleResult<Page<AuditLogModel>> {
        self.audit
            .repository()
            .load_by_target(entity.audit_log_table(), entity.id(), page)
            .await
            .map_err(|cause| storage_error("audit trail", entity.type_name(), Some(entity.id()), cause))
    }

    /// Audit entries of a type matching `query`, newest first
    pub async fn search_audit(
        &self,
        schema: &EntitySchema,
        query: &AuditLogQuery,
        page: PageRequest,
    ) -> LifecycleResult<Page<AuditLogModel>> {
        self.audit
            .repository()
            .search(schema.audit_log_table(), query, page)
            .await
            .map_err(|cause| storage_error("audit search", schema.type_name(), query.target_id, cause))
    }

    /// The save sequence shared by create, update and the partial updates.
    /// Permission checks happen in the callers.
    pub(crate) async fn save(
        &self,
        entity: &mut Entity,
        event: SaveEvent<'_>,
        ctx: &LifecycleContext,
    ) -> LifecycleResult<()> {
        let schema = entity.schema().clone();
        let normalizer = TimezoneNormalizer::from_context(ctx);
        let operation = if event.insert { "insert" } else { "update" };

        debug!(entity_type = schema.type_name(), entity_id = %entity.id(), operation, "before_validate");
        for behavior in schema.behaviors() {
            behavior.before_validate(entity, &event, ctx);
        }

        run_rules(entity, ctx, event.fields).map_err(LifecycleError::Validation)?;

        // pre-save values, captured while the entity is still in user form
        let changed: Vec<String> = if event.insert {
            schema.attributes().iter().map(|a| a.name.clone()).collect()
        } else {
            entity
                .dirty_attributes()
                .into_iter()
                .filter(|attribute| event.touches(attribute))
                .collect()
        };
        if changed.is_empty() && !event.insert {
            debug!(entity_type = schema.type_name(), entity_id = %entity.id(), "nothing to save");
            return Ok(());
        }
        let previous: BTreeMap<String, AttributeValue> = changed
            .iter()
            .map(|attribute| (attribute.clone(), entity.old_value(attribute)))
            .collect();

        debug!(entity_type = schema.type_name(), entity_id = %entity.id(), operation, "before_save");
        for behavior in schema.behaviors() {
            behavior.before_save(entity, &event, ctx);
        }
        normalizer.entity_to_storage(entity);

        let written = if event.insert {
            self.store.insert(entity).await.map(|_| 1)
        } else {
            self.store.update(entity, &changed).await
        };
        match written {
            Ok(0) => {
                normalizer.entity_to_user(entity);
                return Err(LifecycleError::NotFound {
                    entity_type: schema.type_name().to_string(),
                    entity_id: entity.id(),
                });
            }
            Ok(_) => {}
            Err(cause) => {
                normalizer.entity_to_user(entity);
                return Err(storage_error(operation, schema.type_name(), Some(entity.id()), cause));
            }
        }
        entity.mark_persisted();

        debug!(entity_type = schema.type_name(), entity_id = %entity.id(), operation, "after_save");
        let refreshed = self.store.refresh(entity).await;
        normalizer.entity_to_user(entity);
        refreshed.map_err(|cause| storage_error("refresh", schema.type_name(), Some(entity.id()), cause))?;
        entity.snapshot();

        for behavior in schema.behaviors() {
            behavior.after_save(entity, &event, ctx);
        }

        info!(
            entity_type = schema.type_name(),
            entity_id = %entity.id(),
            operation,
            attributes = changed.len(),
            "entity saved"
        );

        if let Err(cause) = self.audit.record(entity, &previous, ctx).await {
            warn!(
                entity_type = schema.type_name(),
                entity_id = %entity.id(),
                error = %cause,
                "entity saved but its audit entry was not written"
            );
            return Err(LifecycleError::AuditWriteFailure {
                entity_type: schema.type_name().to_string(),
                entity_id: entity.id(),
                cause,
            });
        }

        Ok(())
    }
}

/// Converts a freshly loaded record to user form and runs `after_find`.
///
/// The user-form values become the baseline for dirty tracking.
pub(crate) fn hydrate(mut entity: Entity, ctx: &LifecycleContext) -> Entity {
    TimezoneNormalizer::from_context(ctx).entity_to_user(&mut entity);
    let schema = entity.schema().clone();
    for behavior in schema.behaviors() {
        behavior.after_find(&mut entity, ctx);
    }
    entity.snapshot();
    entity
}

pub(crate) fn storage_error(
    operation: &'static str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    cause: BoxError,
) -> LifecycleError {
    LifecycleError::Storage {
        operation,
        entity_type: entity_type.to_string(),
        entity_id,
        cause,
    }
}

fn declared_fields(entity: &Entity, fields: &[&str]) -> Result<Vec<String>, ConfigurationError> {
    fields
        .iter()
        .map(|field| {
            if entity.schema().has_attribute(field) {
                Ok(field.to_string())
            } else {
                Err(ConfigurationError::UnknownAttribute {
                    entity_type: entity.type_name().to_string(),
                    attribute: field.to_string(),
                })
            }
        })
        .collect()
}

impl std::fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("gate", &self.gate)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{MemoryAuditLogRepository, MemoryStore, StaticAuthorizer, StoreOperation};
    use crate::lifecycle::behaviors::JsonBehavior;
    use crate::lifecycle::rules::ArrayRule;
    use crate::models::audit::AuditValues;
    use chrono::{TimeZone, Utc};
    use lifecycle_core_api::{parse_time_zone, Action, AttributeType, FixedClock};
    use serde_json::json;

    struct Fixture {
        orchestrator: LifecycleOrchestrator,
        store: Arc<MemoryStore>,
        audit: Arc<MemoryAuditLogRepository>,
        ctx: LifecycleContext,
    }

    /// User zone +03:00, storage zone UTC, clock stuck at 2024-01-10 09:00:00 UTC
    fn fixture(authorizer: StaticAuthorizer) -> Fixture {
        let ctx = LifecycleContext::new(
            Some(Uuid::new_v4()),
            parse_time_zone("+03:00").unwrap(),
            parse_time_zone("UTC").unwrap(),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap())),
        );
        let store = Arc::new(MemoryStore::with_context(&ctx));
        let audit = Arc::new(MemoryAuditLogRepository::new());
        let orchestrator = LifecycleOrchestrator::new(store.clone(), audit.clone(), Arc::new(authorizer));
        Fixture {
            orchestrator,
            store,
            audit,
            ctx,
        }
    }

    fn schema() -> Arc<EntitySchema> {
        EntitySchema::builder("Article", "article")
            .attribute("a", AttributeType::Integer)
            .attribute("b", AttributeType::String)
            .attribute("published_at", AttributeType::DateTime)
            .attribute("is_delete", AttributeType::Boolean)
            .attribute("date_create", AttributeType::DateTime)
            .attribute("date_update", AttributeType::DateTime)
            .apply_conventions(&lifecycle_core_api::LifecycleConfig::default())
            .build()
            .unwrap()
    }

    async fn created(f: &Fixture) -> Entity {
        let mut article = Entity::new(schema());
        article.set("a", 1).unwrap();
        article.set("b", "x").unwrap();
        article.set("is_delete", false).unwrap();
        f.orchestrator.create(&mut article, &f.ctx).await.unwrap();
        article
    }

    #[tokio::test]
    async fn test_insert_is_audited_with_null_before_values() {
        let f = fixture(StaticAuthorizer::allow_all());
        let article = created(&f).await;

        let entries = f.audit.entries("article_log");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_id(), f.ctx.actor_id());
        assert_eq!(entries[0].before().get("a"), Some(&json!(null)));
        assert_eq!(entries[0].after().get("a"), Some(&json!(1)));
        assert!(!entries[0].after().contains_key("date_create"));
        assert!(!article.is_new());
        assert!(!article.is_dirty());
    }

    #[tokio::test]
    async fn test_only_changed_non_datetime_attributes_are_audited() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;

        article.set("a", 2).unwrap();
        article.set("b", "x").unwrap();
        f.orchestrator.update(&mut article, &f.ctx).await.unwrap();

        let entries = f.audit.entries("article_log");
        assert_eq!(entries.len(), 2);
        let update = &entries[1];
        let before: AuditValues = [("a".to_string(), json!(1))].into_iter().collect();
        let after: AuditValues = [("a".to_string(), json!(2))].into_iter().collect();
        assert_eq!(update.before(), &before);
        assert_eq!(update.after(), &after);
    }

    #[tokio::test]
    async fn test_datetime_only_change_writes_no_entry() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;

        article.set("published_at", "2024-02-01 10:00:00").unwrap();
        f.orchestrator.update(&mut article, &f.ctx).await.unwrap();

        assert_eq!(f.audit.entries("article_log").len(), 1);
        assert_eq!(
            f.store.row("article", article.id()).unwrap().get("published_at"),
            Some(&AttributeValue::text("2024-02-01 07:00:00"))
        );
    }

    #[tokio::test]
    async fn test_datetimes_are_stored_in_storage_zone_and_exposed_in_user_zone() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = Entity::new(schema());
        article.set("published_at", "2024-01-01 01:00:00").unwrap();
        f.orchestrator.create(&mut article, &f.ctx).await.unwrap();

        let row = f.store.row("article", article.id()).unwrap();
        assert_eq!(row.get("published_at"), Some(&AttributeValue::text("2023-12-31 22:00:00")));
        assert_eq!(row.get("date_create"), Some(&AttributeValue::text("2024-01-10 09:00:00")));

        assert_eq!(article.get("published_at"), Some(&AttributeValue::text("2024-01-01 01:00:00")));
        assert_eq!(article.get("date_create"), Some(&AttributeValue::text("2024-01-10 12:00:00")));
        assert_eq!(article.storage_value("date_create", &f.ctx), "2024-01-10 09:00:00");

        let found = f
            .orchestrator
            .find(&schema(), article.id(), &f.ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("published_at"), article.get("published_at"));
        assert_eq!(found.get("date_update"), Some(&AttributeValue::text("2024-01-10 12:00:00")));
    }

    #[tokio::test]
    async fn test_audit_failure_after_commit_is_reported() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;
        f.audit.fail_writes(true);

        article.set("a", 7).unwrap();
        let err = f.orchestrator.update(&mut article, &f.ctx).await.unwrap_err();

        assert!(matches!(err, LifecycleError::AuditWriteFailure { entity_id, .. } if entity_id == article.id()));
        assert_eq!(
            f.store.row("article", article.id()).unwrap().get("a"),
            Some(&AttributeValue::Integer(7))
        );
    }

    #[tokio::test]
    async fn test_validation_failure_writes_nothing() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = Entity::new(schema());
        article.set("published_at", "tomorrow").unwrap();

        let err = f.orchestrator.create(&mut article, &f.ctx).await.unwrap_err();

        match err {
            LifecycleError::Validation(errors) => {
                assert_eq!(errors.first(), Some("The format of Published At is invalid."))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(f.store.count("article"), 0);
        assert!(f.audit.entries("article_log").is_empty());
        assert!(article.is_new());
    }

    #[tokio::test]
    async fn test_denied_create_writes_nothing() {
        let f = fixture(StaticAuthorizer::deny_all());
        let mut article = Entity::new(schema());
        article.set("a", 1).unwrap();

        let err = f.orchestrator.create(&mut article, &f.ctx).await.unwrap_err();

        assert!(matches!(err, LifecycleError::PermissionDenied { action: Action::Create, .. }));
        assert_eq!(f.store.count("article"), 0);
    }

    #[tokio::test]
    async fn test_update_of_vanished_record_is_not_found() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;
        let mut twin = f.orchestrator.find(&schema(), article.id(), &f.ctx).await.unwrap().unwrap();
        f.orchestrator.delete(&mut twin, &f.ctx).await.unwrap();

        article.set("published_at", "2024-03-01 10:00:00").unwrap();
        let err = f.orchestrator.update(&mut article, &f.ctx).await.unwrap_err();

        assert!(matches!(err, LifecycleError::NotFound { .. }));
        assert_eq!(article.get("published_at"), Some(&AttributeValue::text("2024-03-01 10:00:00")));
    }

    #[tokio::test]
    async fn test_update_fields_writes_only_the_allowlist() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;

        article.set("a", 10).unwrap();
        article.set("b", "y").unwrap();
        f.orchestrator.update_fields(&mut article, &["a"], &f.ctx).await.unwrap();

        let row = f.store.row("article", article.id()).unwrap();
        assert_eq!(row.get("a"), Some(&AttributeValue::Integer(10)));
        assert_eq!(row.get("b"), Some(&AttributeValue::text("x")));
        assert_eq!(article.get("b"), Some(&AttributeValue::text("x")));

        let err = f
            .orchestrator
            .update_fields(&mut article, &["missing"], &f.ctx)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_scopes_filter_on_the_soft_delete_flag() {
        let f = fixture(StaticAuthorizer::allow_all());
        let _active = created(&f).await;
        let mut deleted = created(&f).await;
        f.orchestrator.soft_delete(&mut deleted, &f.ctx).await.unwrap();

        let all = f.orchestrator.find_all(&schema(), Scope::All, &f.ctx).await.unwrap();
        let trash = f.orchestrator.find_all(&schema(), Scope::Deleted, &f.ctx).await.unwrap();
        let live = f.orchestrator.find_all(&schema(), Scope::default(), &f.ctx).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id(), deleted.id());
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn test_audit_trail_and_search() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = created(&f).await;
        article.set("a", 2).unwrap();
        f.orchestrator.update(&mut article, &f.ctx).await.unwrap();

        let trail = f
            .orchestrator
            .audit_trail(&article, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(trail.total, 2);
        // same clock instant: the later write comes first
        assert_eq!(trail.items[0].after().get("a"), Some(&json!(2)));

        let by_someone_else = AuditLogQuery::default().by_actor(Uuid::new_v4());
        let page = f
            .orchestrator
            .search_audit(&schema(), &by_someone_else, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_found_record_starts_clean_in_user_form() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = Entity::new(schema());
        article.set("a", 1).unwrap();
        article.set("published_at", "2024-01-01 01:00:00").unwrap();
        f.orchestrator.create(&mut article, &f.ctx).await.unwrap();

        let mut found = f
            .orchestrator
            .find(&schema(), article.id(), &f.ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(!found.is_dirty());
        assert_eq!(found.old_value("published_at"), AttributeValue::text("2024-01-01 01:00:00"));

        found.set("a", 2).unwrap();
        assert_eq!(found.dirty_attributes(), vec!["a".to_string()]);
        f.orchestrator.update(&mut found, &f.ctx).await.unwrap();

        let row = f.store.row("article", article.id()).unwrap();
        assert_eq!(row.get("published_at"), Some(&AttributeValue::text("2023-12-31 22:00:00")));
        let entries = f.audit.entries("article_log");
        assert_eq!(entries[1].before().get("a"), Some(&json!(1)));
        assert!(!entries[1].before().contains_key("b"));

        let listed = f.orchestrator.find_all(&schema(), Scope::All, &f.ctx).await.unwrap();
        assert!(listed.iter().all(|entity| !entity.is_dirty()));
    }

    #[tokio::test]
    async fn test_refresh_failure_after_write_is_reported() {
        let f = fixture(StaticAuthorizer::allow_all());
        let mut article = Entity::new(schema());
        article.set("a", 1).unwrap();
        article.set("published_at", "2024-01-01 01:00:00").unwrap();
        f.orchestrator.create(&mut article, &f.ctx).await.unwrap();
        f.store.fail_on(StoreOperation::Load, article.id());

        article.set("a", 5).unwrap();
        let err = f.orchestrator.update(&mut article, &f.ctx).await.unwrap_err();

        assert!(matches!(err, LifecycleError::Storage { operation: "refresh", .. }));
        assert_eq!(
            f.store.row("article", article.id()).unwrap().get("a"),
            Some(&AttributeValue::Integer(5))
        );
        assert_eq!(article.get("published_at"), Some(&AttributeValue::text("2024-01-01 01:00:00")));
        assert!(!article.is_new());
        assert_eq!(f.audit.entries("article_log").len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_maps_ids_to_labels() {
        let f = fixture(StaticAuthorizer::allow_all());
        let first = created(&f).await;
        let mut second = created(&f).await;
        second.set("b", "second").unwrap();
        f.orchestrator.update(&mut second, &f.ctx).await.unwrap();
        f.orchestrator.soft_delete(&mut second, &f.ctx).await.unwrap();

        let live = f.orchestrator.list_all(&schema(), "b", Scope::NotDeleted, &f.ctx).await.unwrap();
        assert_eq!(live, vec![(first.id(), AttributeValue::text("x"))]);

        let all = f.orchestrator.list_all(&schema(), "b", Scope::All, &f.ctx).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&(second.id(), AttributeValue::text("second"))));

        let err = f
            .orchestrator
            .list_all(&schema(), "name", Scope::All, &f.ctx)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_json_mapped_attribute_round_trips_through_the_store() {
        let f = fixture(StaticAuthorizer::allow_all());
        let document = EntitySchema::builder("Document", "document")
            .attribute("title", AttributeType::String)
            .attribute("tags_json", AttributeType::Json)
            .transient("tags", AttributeType::Json)
            .rule(Arc::new(ArrayRule::new(vec!["tags".to_string()])))
            .behavior(Arc::new(JsonBehavior::new([("tags", "tags_json")])))
            .build()
            .unwrap();

        let mut entity = Entity::new(document.clone());
        entity.set("title", "Guide").unwrap();
        entity.set("tags", AttributeValue::Json(json!(["rust", "db"]))).unwrap();
        f.orchestrator.create(&mut entity, &f.ctx).await.unwrap();

        assert_eq!(
            f.store.row("document", entity.id()).unwrap().get("tags_json"),
            Some(&AttributeValue::Json(json!(["rust", "db"])))
        );
        assert!(f.store.row("document", entity.id()).unwrap().get("tags").is_none());
        assert_eq!(entity.get("tags"), Some(&AttributeValue::Json(json!(["rust", "db"]))));

        let mut found = f.orchestrator.find(&document, entity.id(), &f.ctx).await.unwrap().unwrap();
        assert_eq!(found.get("tags"), Some(&AttributeValue::Json(json!(["rust", "db"]))));
        assert!(!found.is_dirty());

        found.set("tags", AttributeValue::Json(json!({"not": "a list"}))).unwrap();
        let err = f.orchestrator.update(&mut found, &f.ctx).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
}
