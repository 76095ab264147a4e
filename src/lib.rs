//! # Tenancy Core
//!
//! Multi-tenant database lifecycle management and pooled transactional
//! access for resource services. Provisions, migrates and tears down
//! per-tenant isolated databases on a shared cluster, and exposes a
//! concurrency-correct way to acquire connections, run transactions and
//! build dynamic filtered queries.
//!
//! Consumers depend on exactly three things: a [`db::Pool`] to run CRUD
//! queries against, [`db::Pool::with_transaction`] for multi-statement
//! consistency, and [`manager::TenantManager::get_tenant_pool`] to resolve
//! tenant isolation.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod migrations;
pub mod models;
pub mod query;
pub mod repositories;
pub use migration;

pub use config::{AppConfig, ConfigLoader};
pub use db::{ConnectionStats, Pool, PoolTransaction};
pub use error::TenancyError;
pub use manager::{CreateTenantRequest, TenantManager};
pub use migrations::{MigrationManager, MigrationStatus};
pub use models::tenant::TenantStatus;
pub use query::QueryBuilder;
pub use repositories::{TenantFilter, TenantRepository};
