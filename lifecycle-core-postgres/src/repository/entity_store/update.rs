use lifecycle_core_api::AttributeValue;
use lifecycle_core_db::models::entity::Entity;
use lifecycle_core_db::repository::entity_store::StoreResult;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use crate::executor::Executor;
use crate::utils::{push_value, quote_ident, DateTimeCodec};

use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn update_impl(
        executor: &Executor,
        codec: &DateTimeCodec,
        entity: &Entity,
        fields: &[String],
    ) -> StoreResult<usize> {
        let schema = entity.schema();
        let mut builder: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET ", quote_ident(schema.table())?));
        if fields.is_empty() {
            // still reports whether the row exists
            builder.push("\"id\" = \"id\"");
        }
        for (index, field) in fields.iter().enumerate() {
            let attribute = schema
                .attribute(field)
                .ok_or_else(|| format!("Unknown attribute '{field}' on {}", schema.type_name()))?;
            if index > 0 {
                builder.push(", ");
            }
            builder.push(quote_ident(&attribute.name)?).push(" = ");
            let value = entity.get(&attribute.name).unwrap_or(&AttributeValue::Null);
            push_value(&mut builder, &attribute.name, attribute.ty, value, codec)?;
        }
        builder.push(" WHERE \"id\" = ").push_bind(entity.id());
        let query = builder.build();

        let mut tx = executor.tx.lock().await;
        let result = if let Some(transaction) = tx.as_mut() {
            query.execute(&mut **transaction).await?
        } else {
            return Err("Transaction has been consumed".into());
        };

        debug!(
            table = schema.table(),
            entity_id = %entity.id(),
            rows = result.rows_affected(),
            "row updated"
        );
        Ok(result.rows_affected() as usize)
    }
}
