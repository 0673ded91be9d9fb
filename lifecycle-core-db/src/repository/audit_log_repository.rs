use async_trait::async_trait;
use uuid::Uuid;

use crate::models::audit::{AuditLogModel, AuditLogQuery};
use crate::repository::entity_store::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Persistence of audit entries, one log table per audited entity type.
///
/// # Example
/// ```ignore
/// let page = repo.load_by_target("article_log", article_id, PageRequest::new(20, 0)).await?;
/// println!("Page {} of {}", page.page_number(), page.total_pages());
/// ```
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Append one entry to `log_table`
    ///
    /// # Returns
    /// * `Ok(AuditLogModel)` - The entry as stored
    /// * `Err` - The entry could not be written
    async fn create(&self, log_table: &str, entry: &AuditLogModel) -> StoreResult<AuditLogModel>;

    /// Entries of `log_table` matching `query`, newest first
    async fn search(
        &self,
        log_table: &str,
        query: &AuditLogQuery,
        page: PageRequest,
    ) -> StoreResult<Page<AuditLogModel>>;

    /// Entries written for one entity, newest first
    async fn load_by_target(
        &self,
        log_table: &str,
        target_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<AuditLogModel>> {
        self.search(log_table, &AuditLogQuery::for_target(target_id), page).await
    }
}
