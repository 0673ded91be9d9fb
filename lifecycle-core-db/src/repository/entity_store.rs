use async_trait::async_trait;
use lifecycle_core_api::{AttributeValue, BoxError};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::entity::Entity;
use crate::models::schema::EntitySchema;

/// Result type of storage collaborator calls
pub type StoreResult<T> = Result<T, BoxError>;

/// Equality filter on one attribute; a null value matches nulls
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub value: AttributeValue,
}

impl Condition {
    pub fn eq(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Persistence primitives the lifecycle layer wraps.
///
/// Entities passed in and handed out are in storage form: datetime attributes
/// are literals in the storage zone, and `Expression` values are evaluated by
/// the implementation at write time.
///
/// # Example
/// ```ignore
/// #[async_trait]
/// impl EntityStore for MyStore {
///     async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>> {
///         // Implementation
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load one record by id
    ///
    /// # Returns
    /// * `Ok(None)` - No record with this id exists
    async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>>;

    /// All records of a type matching every condition
    async fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> StoreResult<Vec<Entity>>;

    /// Insert a new record with all of its attributes
    async fn insert(&self, entity: &Entity) -> StoreResult<()>;

    /// Write only the listed attributes of an existing record
    ///
    /// # Returns
    /// * `Ok(usize)` - The number of rows updated, 0 when the record is gone
    async fn update(&self, entity: &Entity, fields: &[String]) -> StoreResult<usize>;

    /// Physically remove one record
    ///
    /// # Returns
    /// * `Ok(usize)` - The number of rows deleted
    async fn delete(&self, entity: &Entity) -> StoreResult<usize>;

    /// Re-read the attributes of a saved record
    async fn refresh(&self, entity: &mut Entity) -> StoreResult<()> {
        let fresh = self
            .load(entity.schema(), entity.id())
            .await?
            .ok_or_else(|| format!("{} {} vanished before refresh", entity.type_name(), entity.id()))?;
        entity.reload_from(fresh);
        Ok(())
    }
}

/// A store that can open a transaction
#[async_trait]
pub trait TransactionalStore: EntityStore {
    /// Open a transaction; every call made through the returned handle is part of it
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// An open transaction.
///
/// Dropping the handle without committing discards its writes.
#[async_trait]
pub trait StoreTransaction: EntityStore {
    async fn commit(&self) -> StoreResult<()>;

    async fn rollback(&self) -> StoreResult<()>;
}
