//! Tenant entity model.
//!
//! One row per tenant, kept forever: soft deletion moves the row to
//! `terminated` but never removes it, so the audit trail outlives the
//! tenant's physical database.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant lifecycle status.
///
/// `active` and `suspended` may flip back and forth; everything else is
/// one-way: `active|suspended -> terminating -> terminated`, and nothing
/// leaves `terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "terminating")]
    Terminating,
    #[sea_orm(string_value = "terminated")]
    Terminated,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "terminating" => Some(Self::Terminating),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(&self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        match (self, next) {
            (Active, Suspended) | (Suspended, Active) => true,
            (Active, Terminating) | (Suspended, Terminating) => true,
            (Terminating, Terminated) => true,
            (current, next) => *current == next,
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant metadata row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Stable identifier, immutable.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Unique human-chosen slug.
    #[sea_orm(unique)]
    pub name: String,

    pub display_name: String,

    pub description: String,

    /// Physical database identifier, derived from `name` at creation time
    /// and immutable thereafter.
    pub database_name: String,

    pub status: TenantStatus,

    /// Opaque key/value settings map.
    pub settings: Json,

    /// Opaque key/value resource-limit map.
    pub resource_limits: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
