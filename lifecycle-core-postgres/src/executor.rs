use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A shared handle on one open transaction.
///
/// Every repository built from the same executor writes through the same
/// transaction. Once committed or rolled back the handle is consumed and
/// further statements fail.
#[derive(Clone)]
pub struct Executor {
    pub tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub async fn begin(pool: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Self::new(pool.begin().await?))
    }

    pub async fn commit(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let transaction = self.tx.lock().await.take().ok_or("Transaction has been consumed")?;
        transaction.commit().await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let transaction = self.tx.lock().await.take().ok_or("Transaction has been consumed")?;
        transaction.rollback().await?;
        Ok(())
    }

    pub async fn is_consumed(&self) -> bool {
        self.tx.lock().await.is_none()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}
