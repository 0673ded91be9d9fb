use lifecycle_core_db::models::entity::Entity;
use lifecycle_core_db::repository::entity_store::StoreResult;
use tracing::debug;

use crate::executor::Executor;
use crate::utils::quote_ident;

use super::repo_impl::EntityStoreImpl;

impl EntityStoreImpl {
    pub(super) async fn delete_impl(executor: &Executor, entity: &Entity) -> StoreResult<usize> {
        let table = entity.schema().table();
        let sql = format!("DELETE FROM {} WHERE \"id\" = $1", quote_ident(table)?);
        let query = sqlx::query(&sql).bind(entity.id());

        let mut tx = executor.tx.lock().await;
        let result = if let Some(transaction) = tx.as_mut() {
            query.execute(&mut **transaction).await?
        } else {
            return Err("Transaction has been consumed".into());
        };

        debug!(table, entity_id = %entity.id(), rows = result.rows_affected(), "row deleted");
        Ok(result.rows_affected() as usize)
    }
}
