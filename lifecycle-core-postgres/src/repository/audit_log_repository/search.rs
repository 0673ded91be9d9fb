use lifecycle_core_db::{
    models::audit::{AuditLogModel, AuditLogQuery},
    repository::{
        entity_store::StoreResult,
        pagination::{Page, PageRequest},
    },
};
use sqlx::{Postgres, QueryBuilder, Row};

use crate::utils::{quote_ident, PostgresStoreError, TryFromRow};

use super::repo_impl::AuditLogRepositoryImpl;

impl AuditLogRepositoryImpl {
    pub(super) async fn search_impl(
        repo: &AuditLogRepositoryImpl,
        log_table: &str,
        query: &AuditLogQuery,
        page: PageRequest,
    ) -> StoreResult<Page<AuditLogModel>> {
        let table = quote_ident(log_table)?;
        let (limit, offset) = page_window(page)?;

        let mut count: QueryBuilder<'static, Postgres> =
            QueryBuilder::new(format!("SELECT COUNT(*) AS total FROM {table}"));
        push_filters(&mut count, query);

        let mut select: QueryBuilder<'static, Postgres> = QueryBuilder::new(format!(
            "SELECT id, user_id, model_id, data_before, data_after, date_create FROM {table}"
        ));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY date_create DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let executor = repo.begin().await?;
        let (total, rows) = {
            let mut tx = executor.tx.lock().await;
            if let Some(transaction) = tx.as_mut() {
                let total: i64 = count.build().fetch_one(&mut **transaction).await?.try_get("total")?;
                let rows = select.build().fetch_all(&mut **transaction).await?;
                (total, rows)
            } else {
                return Err("Transaction has been consumed".into());
            }
        };
        executor.commit().await?;

        let items = rows
            .iter()
            .map(AuditLogModel::try_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, usize::try_from(total)?, page.limit, page.offset))
    }
}

/// LIMIT and OFFSET as the BIGINT binds Postgres expects
fn page_window(page: PageRequest) -> Result<(i64, i64), PostgresStoreError> {
    let out_of_range = || PostgresStoreError::PageOutOfRange {
        limit: page.limit,
        offset: page.offset,
    };
    let limit = i64::try_from(page.limit).map_err(|_| out_of_range())?;
    let offset = i64::try_from(page.offset).map_err(|_| out_of_range())?;
    Ok((limit, offset))
}

fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, query: &AuditLogQuery) {
    let mut keyword = " WHERE ";
    let mut next = |builder: &mut QueryBuilder<'static, Postgres>, clause: &str| {
        builder.push(keyword).push(clause);
        keyword = " AND ";
    };
    if let Some(id) = query.id {
        next(builder, "id = ");
        builder.push_bind(id);
    }
    if let Some(actor_id) = query.actor_id {
        next(builder, "user_id = ");
        builder.push_bind(actor_id);
    }
    if let Some(target_id) = query.target_id {
        next(builder, "model_id = ");
        builder.push_bind(target_id);
    }
    if let Some(from) = query.created_from {
        next(builder, "date_create >= ");
        builder.push_bind(from);
    }
    if let Some(until) = query.created_until {
        next(builder, "date_create < ");
        builder.push_bind(until);
    }
}
