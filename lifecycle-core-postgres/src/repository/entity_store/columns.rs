use lifecycle_core_api::AttributeType;
use lifecycle_core_db::repository::entity_store::StoreResult;
use sqlx::Row;

use crate::executor::Executor;
use crate::utils::attribute_type_of;

use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn columns_impl(
        executor: &Executor,
        table: &str,
    ) -> StoreResult<Vec<(String, AttributeType)>> {
        let query = sqlx::query(
            r#"
            SELECT column_name::TEXT AS column_name, data_type::TEXT AS data_type
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table);

        let mut tx = executor.tx.lock().await;
        let rows = if let Some(transaction) = tx.as_mut() {
            query.fetch_all(&mut **transaction).await?
        } else {
            return Err("Transaction has been consumed".into());
        };

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            let ty = attribute_type_of(table, &name, &data_type)?;
            columns.push((name, ty));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::setup_test_context;
    use lifecycle_core_api::AttributeType;
    use lifecycle_core_db::repository::introspection::{introspect_schema, SchemaIntrospection};

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_columns_of_post_table() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let columns = ctx.store.columns("post").await?;

        assert_eq!(columns.first(), Some(&("id".to_string(), AttributeType::Uuid)));
        assert!(columns.contains(&("views".to_string(), AttributeType::Integer)));
        assert!(columns.contains(&("published_at".to_string(), AttributeType::DateTime)));

        let schema = introspect_schema(&ctx.store, "Post", "post").await?.build()?;
        assert!(!schema.has_attribute("id"));
        assert!(schema.has_attribute("title"));

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_unknown_table_has_no_columns() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        assert!(ctx.store.columns("no_such_table").await?.is_empty());
        assert!(introspect_schema(&ctx.store, "Ghost", "no_such_table").await.is_err());
        Ok(())
    }
}
