//! # Error Handling
//!
//! Typed failures for the tenancy core. Every error carries enough context
//! (tenant id/name, underlying cause) for the caller to decide between
//! retry and abort; compensation failures are appended to the triggering
//! error instead of replacing it.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Unified error type for pool, tenant and migration operations.
#[derive(Debug, Error)]
pub enum TenancyError {
    /// No valid database identifier can be derived from the tenant name.
    #[error("cannot derive a valid database identifier from tenant name '{name}'")]
    InvalidName { name: String },

    /// A tenant with the same unique name already exists.
    #[error("tenant '{name}' already exists")]
    Conflict { name: String },

    /// The tenant metadata row could not be written.
    #[error("failed to persist tenant metadata: {source}")]
    Persistence {
        #[source]
        source: DbErr,
    },

    /// Physical database creation failed; a compensation was attempted.
    #[error("failed to provision database '{database}' for tenant {tenant_id}: {source}")]
    Provisioning {
        tenant_id: Uuid,
        database: String,
        #[source]
        source: DbErr,
    },

    /// Schema initialization of a freshly created database failed; the
    /// database and metadata row were rolled back by compensation.
    #[error("failed to initialize database '{database}' for tenant {tenant_id}: {source}")]
    Initialization {
        tenant_id: Uuid,
        database: String,
        #[source]
        source: DbErr,
    },

    /// Point lookup found no matching row.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// An update touched a field outside the allow-list.
    #[error("field '{field}' is not updatable")]
    NotUpdatable { field: String },

    /// A tenant-scoped pool was requested for a non-active tenant.
    #[error("tenant {tenant_id} is not active (status: {status})")]
    InactiveTenant { tenant_id: Uuid, status: String },

    /// Commit or rollback was invoked on an already-completed transaction.
    #[error("transaction already committed or rolled back")]
    TransactionCompleted,

    /// A cancellable wait (migration polling, connection retry) ran out.
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    /// The backing store is unreachable or the pool holds no connections.
    #[error("database unreachable: {source}")]
    Connectivity {
        #[source]
        source: DbErr,
    },

    /// Request-level validation failure, detected before any I/O.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A migration step could not be applied or reverted.
    #[error("migration failed: {source}")]
    Migration {
        #[source]
        source: DbErr,
    },

    /// Rollback itself failed after an earlier error; the triggering error
    /// is preserved as `cause`.
    #[error("rollback failed after '{cause}': {source}")]
    RollbackFailed {
        cause: Box<TenancyError>,
        #[source]
        source: DbErr,
    },

    /// Catch-all for driver errors that have no more specific mapping.
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl TenancyError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Detects unique-constraint violations across the engines we run on
/// (Postgres in production, SQLite in the test suite).
pub fn is_unique_violation(error: &DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_error.code() {
        let code_str = code.as_ref();
        return code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str);
    }

    false
}
