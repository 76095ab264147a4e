//! Database migrations for the tenancy control plane.
//!
//! Each migration file is reversible; ordering is supplied by the file
//! name and mirrored in [`Migrator::migrations`].

pub use sea_orm_migration::prelude::*;

mod m2025_01_10_000001_create_tenants;
mod m2025_01_10_000002_create_tenant_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_000001_create_tenants::Migration),
            Box::new(m2025_01_10_000002_create_tenant_indexes::Migration),
        ]
    }
}
