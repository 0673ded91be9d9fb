use async_trait::async_trait;
use lifecycle_core_db::{
    models::audit::{AuditLogModel, AuditLogQuery, AuditValues},
    repository::{
        audit_log_repository::AuditLogRepository,
        entity_store::StoreResult,
        pagination::{Page, PageRequest},
    },
};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;

use crate::executor::Executor;
use crate::utils::TryFromRow;

/// Audit log tables on PostgreSQL.
///
/// Every log table has the columns `id`, `user_id`, `model_id`,
/// `data_before`, `data_after` and `date_create`.
#[derive(Debug, Clone)]
pub struct AuditLogRepositoryImpl {
    pub(crate) pool: Arc<PgPool>,
}

impl AuditLogRepositoryImpl {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub(super) async fn begin(&self) -> StoreResult<Executor> {
        Ok(Executor::begin(&self.pool).await?)
    }
}

#[async_trait]
impl AuditLogRepository for AuditLogRepositoryImpl {
    async fn create(&self, log_table: &str, entry: &AuditLogModel) -> StoreResult<AuditLogModel> {
        Self::create_impl(self, log_table, entry).await
    }

    async fn search(
        &self,
        log_table: &str,
        query: &AuditLogQuery,
        page: PageRequest,
    ) -> StoreResult<Page<AuditLogModel>> {
        Self::search_impl(self, log_table, query, page).await
    }
}

impl TryFromRow<PgRow> for AuditLogModel {
    fn try_from_row(row: &PgRow) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let before: AuditValues = serde_json::from_value(row.try_get("data_before")?)?;
        let after: AuditValues = serde_json::from_value(row.try_get("data_after")?)?;
        Ok(AuditLogModel::from_parts(
            row.try_get("id")?,
            row.try_get("user_id")?,
            row.try_get("model_id")?,
            before,
            after,
            row.try_get("date_create")?,
        ))
    }
}
