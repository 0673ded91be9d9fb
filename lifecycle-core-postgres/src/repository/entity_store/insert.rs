use lifecycle_core_api::AttributeValue;
use lifecycle_core_db::models::{entity::Entity, schema::ID_COLUMN};
use lifecycle_core_db::repository::entity_store::StoreResult;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use crate::executor::Executor;
use crate::utils::{push_value, quote_ident, DateTimeCodec};

use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn insert_impl(
        executor: &Executor,
        codec: &DateTimeCodec,
        entity: &Entity,
    ) -> StoreResult<()> {
        let schema = entity.schema();
        let mut columns = vec![quote_ident(ID_COLUMN)?];
        for attribute in schema.attributes() {
            columns.push(quote_ident(&attribute.name)?);
        }

        let mut builder: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            quote_ident(schema.table())?,
            columns.join(", ")
        ));
        builder.push_bind(entity.id());
        for attribute in schema.attributes() {
            builder.push(", ");
            let value = entity.get(&attribute.name).unwrap_or(&AttributeValue::Null);
            push_value(&mut builder, &attribute.name, attribute.ty, value, codec)?;
        }
        builder.push(")");
        let query = builder.build();

        let mut tx = executor.tx.lock().await;
        if let Some(transaction) = tx.as_mut() {
            query.execute(&mut **transaction).await?;
        } else {
            return Err("Transaction has been consumed".into());
        }

        debug!(table = schema.table(), entity_id = %entity.id(), "row inserted");
        Ok(())
    }
}
