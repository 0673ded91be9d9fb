use lifecycle_core_db::{models::audit::AuditLogModel, repository::entity_store::StoreResult};

use crate::utils::quote_ident;

use super::repo_impl::AuditLogRepositoryImpl;

impl AuditLogRepositoryImpl {
    pub(super) async fn create_impl(
        repo: &AuditLogRepositoryImpl,
        log_table: &str,
        entry: &AuditLogModel,
    ) -> StoreResult<AuditLogModel> {
        let sql = format!(
            r#"
            INSERT INTO {} (id, user_id, model_id, data_before, data_after, date_create)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            quote_ident(log_table)?
        );
        let query = sqlx::query(&sql)
            .bind(entry.id())
            .bind(entry.actor_id())
            .bind(entry.target_id())
            .bind(serde_json::to_value(entry.before())?)
            .bind(serde_json::to_value(entry.after())?)
            .bind(entry.created_at());

        let executor = repo.begin().await?;
        {
            let mut tx = executor.tx.lock().await;
            if let Some(transaction) = tx.as_mut() {
                query.execute(&mut **transaction).await?;
            } else {
                return Err("Transaction has been consumed".into());
            }
        }
        executor.commit().await?;

        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_helper::setup_test_context;
    use chrono::{SubsecRound, Utc};
    use lifecycle_core_db::models::audit::{AuditLogModel, AuditValues};
    use lifecycle_core_db::repository::audit_log_repository::AuditLogRepository;
    use lifecycle_core_db::repository::pagination::PageRequest;
    use uuid::Uuid;

    fn new_test_audit_log(target_id: Uuid) -> AuditLogModel {
        let before: AuditValues = [("title".to_string(), serde_json::Value::Null)].into_iter().collect();
        let after: AuditValues = [("title".to_string(), serde_json::json!("Hello"))].into_iter().collect();
        AuditLogModel::new(Uuid::new_v4(), target_id, before, after, Utc::now().trunc_subsecs(6))
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_create_audit_log() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let target_id = Uuid::new_v4();

        let entry = new_test_audit_log(target_id);
        let created = ctx.audit_log_repository.create("post_log", &entry).await?;
        assert_eq!(created.id(), entry.id());

        let page = ctx
            .audit_log_repository
            .load_by_target("post_log", target_id, PageRequest::default())
            .await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0], entry);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL database"]
    #[serial_test::serial]
    async fn test_create_rejects_unsafe_table_name() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ctx = setup_test_context().await?;
        let entry = new_test_audit_log(Uuid::new_v4());

        assert!(ctx.audit_log_repository.create("post_log; --", &entry).await.is_err());
        Ok(())
    }
}
