use lifecycle_core_api::LifecycleContext;
use lifecycle_core_db::{lifecycle::orchestrator::LifecycleOrchestrator, lifecycle::permission::Authorizer};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repository::audit_log_repository::AuditLogRepositoryImpl;
use crate::repository::entity_store::EntityStoreImpl;

pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }

    /// Entity store writing datetimes in the storage zone and format of `ctx`
    pub fn entity_store(&self, ctx: &LifecycleContext) -> EntityStoreImpl {
        EntityStoreImpl::from_context(self.pool.clone(), ctx)
    }

    pub fn audit_log_repository(&self) -> AuditLogRepositoryImpl {
        AuditLogRepositoryImpl::new(self.pool.clone())
    }

    /// Orchestrator over this database; `ctx` fixes the storage zone and format
    pub fn orchestrator(&self, ctx: &LifecycleContext, authorizer: Arc<dyn Authorizer>) -> LifecycleOrchestrator {
        LifecycleOrchestrator::new(
            Arc::new(self.entity_store(ctx)),
            Arc::new(self.audit_log_repository()),
            authorizer,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::{comment_schema, post_schema, setup_test_context};
    use lifecycle_core_api::{parse_time_zone, AttributeValue, LifecycleContext, LifecycleError, SystemClock};
    use lifecycle_core_db::in_memory::StaticAuthorizer;
    use lifecycle_core_db::lifecycle::orchestrator::Scope;
    use lifecycle_core_db::lifecycle::soft_delete::{SoftDeleteOutcome, SoftDeleteState};
    use lifecycle_core_db::models::entity::Entity;
    use lifecycle_core_db::repository::entity_store::{Condition, EntityStore};
    use lifecycle_core_db::repository::pagination::PageRequest;
    use std::sync::Arc;
    use uuid::Uuid;

    fn user_context() -> LifecycleContext {
        LifecycleContext::new(
            Some(Uuid::new_v4()),
            parse_time_zone("+03:00").unwrap(),
            parse_time_zone("UTC").unwrap(),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_full_lifecycle_against_postgres() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_ctx = setup_test_context().await?;
        let ctx = user_context();
        let orchestrator = test_ctx
            .repos
            .orchestrator(&ctx, Arc::new(StaticAuthorizer::allow_all()));

        let mut post = Entity::new(post_schema());
        post.set("title", "  Hello  ")?;
        post.set("published_at", "2024-03-01 12:00:00")?;
        post.set("is_delete", false)?;
        orchestrator.create(&mut post, &ctx).await?;

        assert_eq!(post.get("title"), Some(&AttributeValue::text("Hello")));
        assert_eq!(post.get("published_at"), Some(&AttributeValue::text("2024-03-01 12:00:00")));
        assert!(matches!(post.get("date_create"), Some(AttributeValue::Text(_))));

        let stored = test_ctx.store.load(&post_schema(), post.id()).await?.ok_or("post not found")?;
        assert_eq!(stored.get("published_at"), Some(&AttributeValue::text("2024-03-01 09:00:00")));

        post.set("views", 10i64)?;
        orchestrator.update(&mut post, &ctx).await?;

        for body in ["first", "second"] {
            let mut comment = Entity::new(comment_schema());
            comment.set("post_id", post.id())?;
            comment.set("body", body)?;
            orchestrator.create(&mut comment, &ctx).await?;
        }

        let outcome = orchestrator.soft_delete(&mut post, &ctx).await?;
        assert_eq!(outcome, SoftDeleteOutcome::Applied(SoftDeleteState::Deleted));
        let deleted = orchestrator.find_all(&post_schema(), Scope::Deleted, &ctx).await?;
        assert!(deleted.iter().any(|p| p.id() == post.id()));

        let trail = orchestrator.audit_trail(&post, PageRequest::default()).await?;
        assert_eq!(trail.total, 3);

        orchestrator.delete(&mut post, &ctx).await?;
        assert!(test_ctx.store.load(&post_schema(), post.id()).await?.is_none());
        let comments = test_ctx
            .store
            .find(&comment_schema(), &[Condition::eq("post_id", post.id())])
            .await?;
        assert!(comments.is_empty());

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_update_of_vanished_row_is_not_found() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let test_ctx = setup_test_context().await?;
        let ctx = user_context();
        let orchestrator = test_ctx
            .repos
            .orchestrator(&ctx, Arc::new(StaticAuthorizer::allow_all()));

        let mut post = Entity::new(post_schema());
        post.set("title", "Short-lived")?;
        post.set("is_delete", false)?;
        orchestrator.create(&mut post, &ctx).await?;
        test_ctx.store.delete(&post).await?;

        post.set("title", "Edited")?;
        let err = orchestrator.update(&mut post, &ctx).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));

        Ok(())
    }
}
