use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::audit::{AuditLogModel, AuditLogQuery};
use crate::repository::audit_log_repository::AuditLogRepository;
use crate::repository::entity_store::StoreResult;
use crate::repository::pagination::{Page, PageRequest};

/// Audit log tables kept in process memory
#[derive(Debug, Default)]
pub struct MemoryAuditLogRepository {
    tables: Mutex<HashMap<String, Vec<AuditLogModel>>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `create` fails
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Entries of one table in write order
    pub fn entries(&self, log_table: &str) -> Vec<AuditLogModel> {
        self.tables.lock().get(log_table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AuditLogRepository for MemoryAuditLogRepository {
    async fn create(&self, log_table: &str, entry: &AuditLogModel) -> StoreResult<AuditLogModel> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(format!("audit log table '{log_table}' is unavailable").into());
        }
        self.tables
            .lock()
            .entry(log_table.to_string())
            .or_default()
            .push(entry.clone());
        Ok(entry.clone())
    }

    async fn search(
        &self,
        log_table: &str,
        query: &AuditLogQuery,
        page: PageRequest,
    ) -> StoreResult<Page<AuditLogModel>> {
        let tables = self.tables.lock();
        // latest write first among entries with the same timestamp
        let mut matching: Vec<AuditLogModel> = tables
            .get(log_table)
            .map(|entries| entries.iter().rev().filter(|e| query.matches(e)).cloned().collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(Page::slice(matching, page))
    }
}
