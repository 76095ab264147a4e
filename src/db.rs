//! Connection pool and transaction helpers for the tenancy core.
//!
//! Wraps a pooled sea-orm connection to Postgres (SQLite in tests) with
//! health checks, pool statistics and a transaction-scoped execution
//! helper. The pool is process-wide but explicitly constructed and passed
//! by reference; there is no hidden singleton.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    TransactionTrait,
};
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::error::TenancyError;

const CONNECT_MAX_RETRIES: u32 = 5;

/// Point-in-time snapshot of pool occupancy.
///
/// Recomputed on demand from the live driver pool, never persisted. The
/// driver does not expose acquisition counters or latency, so the snapshot
/// is limited to connection counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total: u32,
    pub idle: u32,
    pub in_use: u32,
    pub max: u32,
}

/// Pooled connection to one logical database.
///
/// Cheap to clone; all clones share the same underlying driver pool.
#[derive(Debug, Clone)]
pub struct Pool {
    db: DatabaseConnection,
}

impl Pool {
    /// Connects to the shared cluster database named in the configuration.
    pub async fn connect(cfg: &AppConfig) -> Result<Self, TenancyError> {
        Self::connect_url(&cfg.database_url, cfg).await
    }

    /// Connects to an explicit DSN (used for tenant-scoped pools) with the
    /// shared pool tuning from the configuration.
    ///
    /// Transient connection failures are retried with exponential backoff
    /// before giving up with a connectivity error.
    pub async fn connect_url(url: &str, cfg: &AppConfig) -> Result<Self, TenancyError> {
        if url.is_empty() {
            return Err(TenancyError::validation("database URL cannot be empty"));
        }

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(cfg.db_max_connections)
            .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging(true)
            .sqlx_logging_level(log::LevelFilter::Debug);

        let mut retry_delay = Duration::from_millis(100);

        for attempt in 1..=CONNECT_MAX_RETRIES {
            match Database::connect(opt.clone()).await {
                Ok(db) => {
                    log::info!("Successfully connected to database (attempt {})", attempt);
                    return Ok(Self { db });
                }
                Err(e) => {
                    if attempt == CONNECT_MAX_RETRIES {
                        log::error!(
                            "Failed to connect to database after {} attempts: {}",
                            CONNECT_MAX_RETRIES,
                            e
                        );
                        return Err(TenancyError::Connectivity { source: e });
                    }

                    log::warn!(
                        "Database connection attempt {} failed: {}, retrying in {:?}",
                        attempt,
                        e,
                        retry_delay
                    );

                    sleep(retry_delay).await;
                    retry_delay *= 2;
                }
            }
        }

        unreachable!("retry loop always returns")
    }

    /// Wraps an already-established connection (used by tests).
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection; implements `ConnectionTrait`, the same
    /// capability seam a transaction exposes.
    pub fn conn(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    /// Round-trips a packet to the backing store.
    pub async fn ping(&self) -> Result<(), TenancyError> {
        self.db
            .ping()
            .await
            .map_err(|source| TenancyError::Connectivity { source })
    }

    /// Fails unless the store answers a ping and the pool holds at least
    /// one connection.
    pub async fn ensure_healthy(&self) -> Result<(), TenancyError> {
        self.ping().await?;

        if self.stats().total == 0 {
            return Err(TenancyError::Connectivity {
                source: sea_orm::DbErr::Custom("connection pool holds no connections".to_string()),
            });
        }

        Ok(())
    }

    /// Snapshot of the live pool counters. Does not block.
    pub fn stats(&self) -> ConnectionStats {
        match self.db.get_database_backend() {
            DbBackend::Postgres => {
                let pool = self.db.get_postgres_connection_pool();
                Self::stats_from(pool.size(), pool.num_idle(), pool.options().get_max_connections())
            }
            DbBackend::Sqlite => {
                let pool = self.db.get_sqlite_connection_pool();
                Self::stats_from(pool.size(), pool.num_idle(), pool.options().get_max_connections())
            }
            _ => ConnectionStats::default(),
        }
    }

    fn stats_from(total: u32, idle: usize, max: u32) -> ConnectionStats {
        let idle = idle as u32;
        ConnectionStats {
            total,
            idle,
            in_use: total.saturating_sub(idle),
            max,
        }
    }

    /// Begins a transaction owned by the caller.
    pub async fn begin(&self) -> Result<PoolTransaction, TenancyError> {
        let inner = self
            .db
            .begin()
            .await
            .map_err(|source| TenancyError::Connectivity { source })?;
        Ok(PoolTransaction { inner: Some(inner) })
    }

    /// Runs `f` inside a transaction: commits when `f` succeeds, rolls back
    /// when it fails. A rollback failure is wrapped together with the
    /// triggering error; the transaction is never left open on any path
    /// (dropping it without a commit rolls it back at the driver level).
    pub async fn with_transaction<F, T>(&self, f: F) -> Result<T, TenancyError>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            )
                -> Pin<Box<dyn Future<Output = Result<T, TenancyError>> + Send + 'c>>
            + Send,
        T: Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|source| TenancyError::Connectivity { source })?;

        match f(&txn).await {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(cause) => match txn.rollback().await {
                Ok(()) => Err(cause),
                Err(source) => Err(TenancyError::RollbackFailed {
                    cause: Box::new(cause),
                    source,
                }),
            },
        }
    }

    /// Closes the pool, dropping all connections. Explicit teardown for
    /// process shutdown.
    pub async fn close(self) -> Result<(), TenancyError> {
        self.db.close().await.map_err(TenancyError::from)
    }
}

/// A single logical unit of work bound to one physical connection.
///
/// Owned exclusively by the caller that began it and never shared across
/// tasks. Exactly one terminal state is reachable: committed or rolled
/// back; a second attempt at either fails. Dropping an open transaction
/// rolls it back when the connection returns to the pool.
pub struct PoolTransaction {
    inner: Option<DatabaseTransaction>,
}

impl PoolTransaction {
    /// The live transaction handle, usable anywhere a `ConnectionTrait`
    /// is accepted.
    pub fn conn(&self) -> Result<&DatabaseTransaction, TenancyError> {
        self.inner.as_ref().ok_or(TenancyError::TransactionCompleted)
    }

    pub fn is_completed(&self) -> bool {
        self.inner.is_none()
    }

    pub async fn commit(&mut self) -> Result<(), TenancyError> {
        match self.inner.take() {
            Some(txn) => txn.commit().await.map_err(TenancyError::from),
            None => Err(TenancyError::TransactionCompleted),
        }
    }

    pub async fn rollback(&mut self) -> Result<(), TenancyError> {
        match self.inner.take() {
            Some(txn) => txn.rollback().await.map_err(TenancyError::from),
            None => Err(TenancyError::TransactionCompleted),
        }
    }
}
