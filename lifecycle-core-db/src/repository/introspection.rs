use async_trait::async_trait;
use lifecycle_core_api::AttributeType;

use crate::models::schema::{EntitySchemaBuilder, ID_COLUMN};
use crate::repository::entity_store::StoreResult;

/// Schema introspection offered by a storage engine
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// Columns of `table` with their semantic types, in table order
    async fn columns(&self, table: &str) -> StoreResult<Vec<(String, AttributeType)>>;
}

/// Starts a schema builder from the columns the store reports for `table`.
///
/// The identifier column is skipped; everything else becomes an attribute.
pub async fn introspect_schema<I: SchemaIntrospection + ?Sized>(
    introspector: &I,
    type_name: &str,
    table: &str,
) -> StoreResult<EntitySchemaBuilder> {
    let columns = introspector.columns(table).await?;
    if columns.is_empty() {
        return Err(format!("Table '{table}' has no columns or does not exist").into());
    }

    Ok(EntitySchemaBuilder::new(type_name, table).attributes(
        columns
            .into_iter()
            .filter(|(name, _)| name != ID_COLUMN),
    ))
}
