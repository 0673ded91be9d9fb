use lifecycle_core_db::models::{entity::Entity, schema::EntitySchema, schema::ID_COLUMN};
use lifecycle_core_db::repository::entity_store::StoreResult;
use sqlx::{postgres::PgRow, Postgres, QueryBuilder, Row};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::executor::Executor;
use crate::utils::{quote_ident, read_value, select_column, DateTimeCodec};

use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn load_impl(
        executor: &Executor,
        codec: &DateTimeCodec,
        schema: &Arc<EntitySchema>,
        id: Uuid,
    ) -> StoreResult<Option<Entity>> {
        let mut builder = select_statement(schema)?;
        builder.push(" WHERE \"id\" = ").push_bind(id);
        let query = builder.build();

        let mut tx = executor.tx.lock().await;
        let row = if let Some(transaction) = tx.as_mut() {
            query.fetch_optional(&mut **transaction).await?
        } else {
            return Err("Transaction has been consumed".into());
        };

        row.map(|row| entity_from_row(schema, &row, codec)).transpose()
    }
}

/// `SELECT` of the id and every declared attribute, without a `WHERE` clause
pub(super) fn select_statement(schema: &EntitySchema) -> StoreResult<QueryBuilder<'static, Postgres>> {
    let mut columns = vec![quote_ident(ID_COLUMN)?];
    for attribute in schema.attributes() {
        columns.push(select_column(&attribute.name, attribute.ty)?);
    }
    Ok(QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(schema.table())?
    )))
}

pub(super) fn entity_from_row(
    schema: &Arc<EntitySchema>,
    row: &PgRow,
    codec: &DateTimeCodec,
) -> StoreResult<Entity> {
    let id: Uuid = row.try_get(ID_COLUMN)?;
    let mut values = BTreeMap::new();
    for attribute in schema.attributes() {
        values.insert(
            attribute.name.clone(),
            read_value(row, &attribute.name, attribute.ty, codec)?,
        );
    }
    Ok(Entity::from_storage(schema.clone(), id, values))
}
