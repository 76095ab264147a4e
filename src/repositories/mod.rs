//! # Repository Layer
//!
//! Data access for tenancy metadata. Repositories are generic over
//! [`sea_orm::ConnectionTrait`], so the same code runs against the shared
//! pool or inside a caller-owned transaction.

pub mod tenant;

pub use tenant::{NewTenant, TenantFilter, TenantRepository};
