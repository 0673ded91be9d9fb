use async_trait::async_trait;
use lifecycle_core_api::{AttributeType, LifecycleContext};
use lifecycle_core_db::{
    models::{entity::Entity, schema::EntitySchema},
    repository::{
        entity_store::{Condition, EntityStore, StoreResult, StoreTransaction, TransactionalStore},
        introspection::SchemaIntrospection,
    },
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::executor::Executor;
use crate::utils::DateTimeCodec;

/// Entity storage on PostgreSQL.
///
/// Calls made on the store itself each run in their own short transaction;
/// `begin` hands out a [`PostgresTransaction`] for multi-statement work.
#[derive(Debug, Clone)]
pub struct EntityStoreImpl {
    pub(crate) pool: Arc<PgPool>,
    pub(crate) codec: DateTimeCodec,
}

impl EntityStoreImpl {
    pub fn new(pool: Arc<PgPool>, codec: DateTimeCodec) -> Self {
        Self { pool, codec }
    }

    /// Storage zone and datetime format taken from `ctx`
    pub fn from_context(pool: Arc<PgPool>, ctx: &LifecycleContext) -> Self {
        Self::new(pool, DateTimeCodec::new(ctx.storage_zone(), ctx.datetime_format()))
    }

    async fn finish<T>(executor: Executor, result: StoreResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                executor.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = executor.rollback().await {
                    warn!(error = %rollback, "rollback after failed statement did not complete");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EntityStore for EntityStoreImpl {
    async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::load_impl(&executor, &self.codec, schema, id).await;
        Self::finish(executor, result).await
    }

    async fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> StoreResult<Vec<Entity>> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::find_impl(&executor, &self.codec, schema, conditions).await;
        Self::finish(executor, result).await
    }

    async fn insert(&self, entity: &Entity) -> StoreResult<()> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::insert_impl(&executor, &self.codec, entity).await;
        Self::finish(executor, result).await
    }

    async fn update(&self, entity: &Entity, fields: &[String]) -> StoreResult<usize> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::update_impl(&executor, &self.codec, entity, fields).await;
        Self::finish(executor, result).await
    }

    async fn delete(&self, entity: &Entity) -> StoreResult<usize> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::delete_impl(&executor, entity).await;
        Self::finish(executor, result).await
    }
}

#[async_trait]
impl TransactionalStore for EntityStoreImpl {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let executor = Executor::begin(&self.pool).await?;
        Ok(Box::new(PostgresTransaction::new(executor, self.codec.clone())))
    }
}

#[async_trait]
impl SchemaIntrospection for EntityStoreImpl {
    async fn columns(&self, table: &str) -> StoreResult<Vec<(String, AttributeType)>> {
        let executor = Executor::begin(&self.pool).await?;
        let result = Self::columns_impl(&executor, table).await;
        Self::finish(executor, result).await
    }
}

/// Entity storage inside one open transaction
#[derive(Debug, Clone)]
pub struct PostgresTransaction {
    pub(crate) executor: Executor,
    pub(crate) codec: DateTimeCodec,
}

impl PostgresTransaction {
    pub fn new(executor: Executor, codec: DateTimeCodec) -> Self {
        Self { executor, codec }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

#[async_trait]
impl EntityStore for PostgresTransaction {
    async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>> {
        EntityStoreImpl::load_impl(&self.executor, &self.codec, schema, id).await
    }

    async fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> StoreResult<Vec<Entity>> {
        EntityStoreImpl::find_impl(&self.executor, &self.codec, schema, conditions).await
    }

    async fn insert(&self, entity: &Entity) -> StoreResult<()> {
        EntityStoreImpl::insert_impl(&self.executor, &self.codec, entity).await
    }

    async fn update(&self, entity: &Entity, fields: &[String]) -> StoreResult<usize> {
        EntityStoreImpl::update_impl(&self.executor, &self.codec, entity, fields).await
    }

    async fn delete(&self, entity: &Entity) -> StoreResult<usize> {
        EntityStoreImpl::delete_impl(&self.executor, entity).await
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn commit(&self) -> StoreResult<()> {
        self.executor.commit().await
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.executor.rollback().await
    }
}
