use lifecycle_core_api::AttributeValue;
use lifecycle_core_db::models::{entity::Entity, schema::EntitySchema};
use lifecycle_core_db::repository::entity_store::{Condition, StoreResult};
use std::sync::Arc;

use crate::executor::Executor;
use crate::utils::{push_value, quote_ident, DateTimeCodec};

use super::load::{entity_from_row, select_statement};
use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn find_impl(
        executor: &Executor,
        codec: &DateTimeCodec,
        schema: &Arc<EntitySchema>,
        conditions: &[Condition],
    ) -> StoreResult<Vec<Entity>> {
        let mut builder = select_statement(schema)?;
        for (index, condition) in conditions.iter().enumerate() {
            let attribute = schema.attribute(&condition.attribute).ok_or_else(|| {
                format!(
                    "Unknown attribute '{}' in condition on {}",
                    condition.attribute,
                    schema.type_name()
                )
            })?;
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(quote_ident(&attribute.name)?);
            if condition.value == AttributeValue::Null {
                builder.push(" IS NULL");
            } else {
                builder.push(" = ");
                push_value(&mut builder, &attribute.name, attribute.ty, &condition.value, codec)?;
            }
        }
        let query = builder.build();

        let mut tx = executor.tx.lock().await;
        let rows = if let Some(transaction) = tx.as_mut() {
            query.fetch_all(&mut **transaction).await?
        } else {
            return Err("Transaction has been consumed".into());
        };

        rows.iter().map(|row| entity_from_row(schema, row, codec)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::{comment_schema, setup_test_context};
    use lifecycle_core_api::AttributeValue;
    use lifecycle_core_db::models::entity::Entity;
    use lifecycle_core_db::repository::entity_store::{Condition, EntityStore, TransactionalStore};
    use uuid::Uuid;

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_find_by_foreign_key() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let tx = ctx.store.begin().await?;
        let post_id = Uuid::new_v4();

        for body in ["first", "second"] {
            let mut comment = Entity::new(comment_schema());
            comment.set("post_id", post_id)?;
            comment.set("body", body)?;
            tx.insert(&comment).await?;
        }
        let mut unrelated = Entity::new(comment_schema());
        unrelated.set("post_id", Uuid::new_v4())?;
        tx.insert(&unrelated).await?;

        let found = tx.find(&comment_schema(), &[Condition::eq("post_id", post_id)]).await?;
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| !c.is_new()));

        let conditions = [
            Condition::eq("post_id", post_id),
            Condition::eq("body", AttributeValue::Null),
        ];
        assert!(tx.find(&comment_schema(), &conditions).await?.is_empty());

        tx.rollback().await?;
        Ok(())
    }
}
