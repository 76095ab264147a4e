//! Schema migration management for a logical database.
//!
//! Wraps the `migration` crate's [`Migrator`](migration::Migrator) with
//! version/dirty reporting and a polling wait primitive, so multiple
//! service instances starting concurrently against a freshly-provisioned
//! database converge without leader election.

use std::time::Duration;

use migration::Migrator;
use sea_orm::DatabaseConnection;
use sea_orm_migration::{MigrationName, MigratorTrait};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::db::Pool;
use crate::error::TenancyError;

/// `(version, dirty)` pair for one database, computed from the migration
/// tooling's own bookkeeping table.
///
/// `version` counts the applied migrations that match the compiled
/// migration sequence in order; `dirty` flags drift — bookkeeping entries
/// this binary does not know, or knows in a different order — which
/// requires manual intervention before further migrations apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: u64,
    pub dirty: bool,
}

/// Applies and reverts versioned migrations against one pool.
pub struct MigrationManager {
    db: DatabaseConnection,
    poll_interval: Duration,
}

impl MigrationManager {
    pub fn new(pool: &Pool, config: &AppConfig) -> Self {
        Self {
            db: pool.conn().clone(),
            poll_interval: Duration::from_millis(config.migration_poll_interval_ms),
        }
    }

    /// Applies all pending migrations in ascending order. A no-op when
    /// already current.
    pub async fn up(&self) -> Result<(), TenancyError> {
        Migrator::up(&self.db, None)
            .await
            .map_err(|source| TenancyError::Migration { source })
    }

    /// Reverts the most recent `n` applied migrations. A no-op when
    /// nothing is applied.
    pub async fn down(&self, n: u32) -> Result<(), TenancyError> {
        Migrator::down(&self.db, Some(n))
            .await
            .map_err(|source| TenancyError::Migration { source })
    }

    /// Applies (`n > 0`) or reverts (`n < 0`) `|n|` migrations. Zero is a
    /// no-op.
    pub async fn steps(&self, n: i64) -> Result<(), TenancyError> {
        if n == 0 {
            return Ok(());
        }
        if n > 0 {
            Migrator::up(&self.db, Some(n as u32))
                .await
                .map_err(|source| TenancyError::Migration { source })
        } else {
            self.down(n.unsigned_abs() as u32).await
        }
    }

    /// Current version and dirty flag; `(0, false)` when nothing has ever
    /// been applied.
    pub async fn status(&self) -> Result<MigrationStatus, TenancyError> {
        Migrator::install(&self.db)
            .await
            .map_err(|source| TenancyError::Migration { source })?;

        let applied = Migrator::get_migration_models(&self.db)
            .await
            .map_err(|source| TenancyError::Migration { source })?;

        let known: Vec<String> = Migrator::migrations()
            .iter()
            .map(|m| m.name().to_owned())
            .collect();

        let mut version = 0u64;
        let mut dirty = false;
        for (i, row) in applied.iter().enumerate() {
            match known.get(i) {
                Some(name) if *name == row.version => version += 1,
                _ => {
                    dirty = true;
                    break;
                }
            }
        }

        Ok(MigrationStatus { version, dirty })
    }

    /// Destroys every managed object by reverting all migrations.
    pub async fn drop_all(&self) -> Result<(), TenancyError> {
        Migrator::reset(&self.db)
            .await
            .map_err(|source| TenancyError::Migration { source })
    }

    /// Drop plus up: a clean slate at the latest version.
    pub async fn reset(&self) -> Result<(), TenancyError> {
        Migrator::refresh(&self.db)
            .await
            .map_err(|source| TenancyError::Migration { source })
    }

    /// Polls [`status`](Self::status) at the configured interval until the
    /// schema is clean and at least at `expected`. Returns immediately
    /// when already satisfied; fails with a timeout when `cancel` fires
    /// first.
    pub async fn wait_for_version(
        &self,
        expected: u64,
        cancel: &CancellationToken,
    ) -> Result<MigrationStatus, TenancyError> {
        loop {
            let status = self.status().await?;
            if !status.dirty && status.version >= expected {
                return Ok(status);
            }

            tracing::debug!(
                version = status.version,
                dirty = status.dirty,
                expected,
                "schema not ready; polling again"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(TenancyError::Timeout {
                        waiting_for: format!("schema version >= {expected}"),
                    });
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }
}
