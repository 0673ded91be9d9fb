use async_trait::async_trait;
use lifecycle_core_api::{AttributeValue, Clock, Expression, LifecycleContext, TimeZoneSpec};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::lifecycle::timezone::render_datetime;
use crate::models::entity::Entity;
use crate::models::schema::EntitySchema;
use crate::repository::entity_store::{
    Condition, EntityStore, StoreResult, StoreTransaction, TransactionalStore,
};

/// One stored record, attribute name to storage-form value
pub type Row = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<String, Vec<(Uuid, Row)>>,
}

impl Tables {
    fn table(&self, name: &str) -> &[(Uuid, Row)] {
        self.rows.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> Option<Entity> {
        self.table(schema.table())
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(row_id, row)| Entity::from_storage(schema.clone(), *row_id, row.clone()))
    }

    fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> Vec<Entity> {
        self.table(schema.table())
            .iter()
            .filter(|(_, row)| {
                conditions.iter().all(|condition| {
                    row.get(&condition.attribute).unwrap_or(&AttributeValue::Null) == &condition.value
                })
            })
            .map(|(id, row)| Entity::from_storage(schema.clone(), *id, row.clone()))
            .collect()
    }

    fn insert(&mut self, entity: &Entity, evaluator: &Evaluator) -> StoreResult<()> {
        let table = self.rows.entry(entity.schema().table().to_string()).or_default();
        if table.iter().any(|(id, _)| *id == entity.id()) {
            return Err(format!("duplicate key {} in {}", entity.id(), entity.schema().table()).into());
        }

        let row = entity
            .schema()
            .attributes()
            .iter()
            .map(|a| {
                let value = entity.get(&a.name).unwrap_or(&AttributeValue::Null);
                (a.name.clone(), evaluator.evaluate(value))
            })
            .collect();
        table.push((entity.id(), row));
        Ok(())
    }

    fn update(&mut self, entity: &Entity, fields: &[String], evaluator: &Evaluator) -> usize {
        let Some(table) = self.rows.get_mut(entity.schema().table()) else {
            return 0;
        };
        let Some((_, row)) = table.iter_mut().find(|(id, _)| *id == entity.id()) else {
            return 0;
        };
        for field in fields {
            let value = entity.get(field).unwrap_or(&AttributeValue::Null);
            row.insert(field.clone(), evaluator.evaluate(value));
        }
        1
    }

    fn delete(&mut self, entity: &Entity) -> usize {
        let Some(table) = self.rows.get_mut(entity.schema().table()) else {
            return 0;
        };
        let before = table.len();
        table.retain(|(id, _)| *id != entity.id());
        before - table.len()
    }
}

/// Evaluates deferred expressions the way a database would at write time
#[derive(Debug, Clone)]
struct Evaluator {
    storage_zone: TimeZoneSpec,
    format: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl Evaluator {
    fn evaluate(&self, value: &AttributeValue) -> AttributeValue {
        match value {
            AttributeValue::Expression(Expression::CurrentTimestamp) => {
                let now = self.storage_zone.from_utc(&self.clock.now());
                AttributeValue::Text(render_datetime(&now, &self.format))
            }
            other => other.clone(),
        }
    }
}

/// Store operations whose failure can be injected per record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Load,
    Update,
    Delete,
}

#[derive(Debug)]
struct Shared {
    tables: Mutex<Tables>,
    failures: Mutex<HashSet<(StoreOperation, Uuid)>>,
    evaluator: Evaluator,
}

impl Shared {
    fn check(&self, operation: StoreOperation, type_name: &str, id: Uuid) -> StoreResult<()> {
        if self.failures.lock().contains(&(operation, id)) {
            return Err(format!("injected {operation:?} failure for {type_name} {id}").into());
        }
        Ok(())
    }
}

/// Entity store kept in process memory.
///
/// A transaction works on a copy of every table and swaps it in on commit,
/// so the last commit wins; tests run one operation at a time.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// UTC storage zone, system clock
    pub fn new() -> Self {
        Self::with_context(&LifecycleContext::utc(None))
    }

    /// Evaluates expressions with the storage zone, format and clock of `ctx`
    pub fn with_context(ctx: &LifecycleContext) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                failures: Mutex::new(HashSet::new()),
                evaluator: Evaluator {
                    storage_zone: ctx.storage_zone(),
                    format: Arc::from(ctx.datetime_format()),
                    clock: ctx.clock(),
                },
            }),
        }
    }

    /// Makes every later `operation` on record `id` fail, in and out of transactions
    pub fn fail_on(&self, operation: StoreOperation, id: Uuid) {
        self.shared.failures.lock().insert((operation, id));
    }

    /// Makes every later delete of `id` fail
    pub fn fail_delete_of(&self, id: Uuid) {
        self.fail_on(StoreOperation::Delete, id);
    }

    pub fn clear_failures(&self) {
        self.shared.failures.lock().clear();
    }

    /// The stored row of one record, as the storage engine holds it
    pub fn row(&self, table: &str, id: Uuid) -> Option<Row> {
        self.shared
            .tables
            .lock()
            .table(table)
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, row)| row.clone())
    }

    pub fn count(&self, table: &str) -> usize {
        self.shared.tables.lock().table(table).len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>> {
        self.shared.check(StoreOperation::Load, schema.type_name(), id)?;
        Ok(self.shared.tables.lock().load(schema, id))
    }

    async fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> StoreResult<Vec<Entity>> {
        Ok(self.shared.tables.lock().find(schema, conditions))
    }

    async fn insert(&self, entity: &Entity) -> StoreResult<()> {
        self.shared.tables.lock().insert(entity, &self.shared.evaluator)
    }

    async fn update(&self, entity: &Entity, fields: &[String]) -> StoreResult<usize> {
        self.shared.check(StoreOperation::Update, entity.type_name(), entity.id())?;
        Ok(self.shared.tables.lock().update(entity, fields, &self.shared.evaluator))
    }

    async fn delete(&self, entity: &Entity) -> StoreResult<usize> {
        self.shared.check(StoreOperation::Delete, entity.type_name(), entity.id())?;
        Ok(self.shared.tables.lock().delete(entity))
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let snapshot = self.shared.tables.lock().clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            working: Mutex::new(Some(snapshot)),
        }))
    }
}

/// An open transaction on a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTransaction {
    shared: Arc<Shared>,
    working: Mutex<Option<Tables>>,
}

impl MemoryTransaction {
    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut working = self.working.lock();
        let tables = working.as_mut().ok_or("Transaction has been consumed")?;
        f(tables)
    }
}

#[async_trait]
impl EntityStore for MemoryTransaction {
    async fn load(&self, schema: &Arc<EntitySchema>, id: Uuid) -> StoreResult<Option<Entity>> {
        self.shared.check(StoreOperation::Load, schema.type_name(), id)?;
        self.with_tables(|tables| Ok(tables.load(schema, id)))
    }

    async fn find(&self, schema: &Arc<EntitySchema>, conditions: &[Condition]) -> StoreResult<Vec<Entity>> {
        self.with_tables(|tables| Ok(tables.find(schema, conditions)))
    }

    async fn insert(&self, entity: &Entity) -> StoreResult<()> {
        self.with_tables(|tables| tables.insert(entity, &self.shared.evaluator))
    }

    async fn update(&self, entity: &Entity, fields: &[String]) -> StoreResult<usize> {
        self.shared.check(StoreOperation::Update, entity.type_name(), entity.id())?;
        self.with_tables(|tables| Ok(tables.update(entity, fields, &self.shared.evaluator)))
    }

    async fn delete(&self, entity: &Entity) -> StoreResult<usize> {
        self.shared.check(StoreOperation::Delete, entity.type_name(), entity.id())?;
        self.with_tables(|tables| Ok(tables.delete(entity)))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(&self) -> StoreResult<()> {
        let tables = self.working.lock().take().ok_or("Transaction has been consumed")?;
        *self.shared.tables.lock() = tables;
        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.working.lock().take().ok_or("Transaction has been consumed")?;
        Ok(())
    }
}
