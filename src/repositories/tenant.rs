//! # Tenant Repository
//!
//! CRUD over the tenant metadata table. Physical database lifecycle lives
//! in the manager; everything here is ordinary row-level work and can run
//! on a pool connection or inside a transaction interchangeably.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::{TenancyError, is_unique_violation};
use crate::models::tenant::{
    ActiveModel as TenantActiveModel, Entity as Tenant, Model as TenantModel, TenantStatus,
};
use crate::query::QueryBuilder;

/// Fields that [`TenantRepository::update_fields`] accepts.
const UPDATABLE_FIELDS: &[&str] = &[
    "display_name",
    "description",
    "status",
    "settings",
    "resource_limits",
];

/// Fully-resolved data for a new metadata row. The manager derives
/// `database_name` before this struct exists; the repository never
/// re-derives it.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub database_name: String,
    pub settings: JsonValue,
    pub resource_limits: JsonValue,
}

/// Filter for listing tenants.
#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub status: Option<TenantStatus>,
    /// Zero means no limit.
    pub limit: u64,
    pub offset: u64,
}

/// Repository for tenant metadata operations.
pub struct TenantRepository<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Inserts the metadata row with status `active`. A duplicate name is
    /// reported as a conflict; the database's unique constraint is the
    /// only arbiter of the create/create race.
    pub async fn insert(&self, record: NewTenant) -> Result<TenantModel, TenancyError> {
        let now = Utc::now().fixed_offset();

        let tenant = TenantActiveModel {
            id: Set(record.id),
            name: Set(record.name.clone()),
            display_name: Set(record.display_name),
            description: Set(record.description),
            database_name: Set(record.database_name),
            status: Set(TenantStatus::Active),
            settings: Set(record.settings),
            resource_limits: Set(record.resource_limits),
            created_at: Set(now),
            updated_at: Set(now),
        };

        tenant.insert(self.conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                TenancyError::Conflict { name: record.name }
            } else {
                TenancyError::Persistence { source: e }
            }
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<TenantModel, TenancyError> {
        Tenant::find_by_id(id)
            .one(self.conn)
            .await?
            .ok_or_else(|| TenancyError::not_found("tenant", id))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<TenantModel, TenancyError> {
        let mut qb = QueryBuilder::new();
        qb.add_condition("name =", name.to_owned());
        let stmt = qb.build("SELECT * FROM tenants", self.conn.get_database_backend());

        Tenant::find()
            .from_raw_sql(stmt)
            .one(self.conn)
            .await?
            .ok_or_else(|| TenancyError::not_found("tenant", name.to_owned()))
    }

    /// Filtered, paginated list ordered by creation time descending. The
    /// status predicate is omitted entirely when no filter is given.
    pub async fn list(&self, filter: &TenantFilter) -> Result<Vec<TenantModel>, TenancyError> {
        let mut qb = QueryBuilder::new();
        qb.add_optional(
            "status =",
            filter.status.map(|s| s.as_str().to_owned()),
        );
        qb.order_by("created_at DESC");
        qb.limit(filter.limit);
        qb.offset(filter.offset);

        let stmt = qb.build("SELECT * FROM tenants", self.conn.get_database_backend());

        Tenant::find()
            .from_raw_sql(stmt)
            .all(self.conn)
            .await
            .map_err(TenancyError::from)
    }

    /// Applies an allow-listed field map. Any key outside the allow-list
    /// fails the whole update; `updated_at` is always stamped. The SET
    /// clause is composed by hand, continuing the builder's positional
    /// index sequence.
    pub async fn update_fields(
        &self,
        id: Uuid,
        fields: &Map<String, JsonValue>,
    ) -> Result<TenantModel, TenancyError> {
        if fields.is_empty() {
            return Err(TenancyError::validation("no fields to update"));
        }

        let current = self.find_by_id(id).await?;

        let mut qb = QueryBuilder::new();
        let mut set_fragments = Vec::with_capacity(fields.len() + 1);

        for (key, value) in fields {
            if !UPDATABLE_FIELDS.contains(&key.as_str()) {
                return Err(TenancyError::NotUpdatable { field: key.clone() });
            }

            match key.as_str() {
                "display_name" | "description" => {
                    let text = value.as_str().ok_or_else(|| {
                        TenancyError::validation(format!("field '{key}' must be a string"))
                    })?;
                    set_fragments.push(format!("{key} = ${}", qb.next_index()));
                    qb.push_value(text.to_owned());
                }
                "status" => {
                    let text = value.as_str().ok_or_else(|| {
                        TenancyError::validation("field 'status' must be a string")
                    })?;
                    let next = TenantStatus::parse(text).ok_or_else(|| {
                        TenancyError::validation(format!("unknown status '{text}'"))
                    })?;
                    if !current.status.can_transition(next) {
                        return Err(TenancyError::validation(format!(
                            "illegal status transition {} -> {}",
                            current.status, next
                        )));
                    }
                    set_fragments.push(format!("status = ${}", qb.next_index()));
                    qb.push_value(next.as_str().to_owned());
                }
                "settings" | "resource_limits" => {
                    if !value.is_object() {
                        return Err(TenancyError::validation(format!(
                            "field '{key}' must be an object"
                        )));
                    }
                    set_fragments.push(format!("{key} = ${}", qb.next_index()));
                    qb.push_value(value.clone());
                }
                _ => unreachable!("allow-list checked above"),
            }
        }

        set_fragments.push(format!("updated_at = ${}", qb.next_index()));
        qb.push_value(Utc::now().fixed_offset());

        let sql = format!(
            "UPDATE tenants SET {} WHERE id = ${}",
            set_fragments.join(", "),
            qb.next_index()
        );
        qb.push_value(id);

        let stmt = sea_orm::Statement::from_sql_and_values(
            self.conn.get_database_backend(),
            sql,
            qb.into_values(),
        );

        let result = self
            .conn
            .execute(stmt)
            .await
            .map_err(|source| TenancyError::Persistence { source })?;

        if result.rows_affected() == 0 {
            return Err(TenancyError::not_found("tenant", id));
        }

        self.find_by_id(id).await
    }

    /// Moves the tenant to `next`, enforcing the transition rules, and
    /// stamps `updated_at`.
    pub async fn set_status(
        &self,
        id: Uuid,
        next: TenantStatus,
    ) -> Result<TenantModel, TenancyError> {
        let current = self.find_by_id(id).await?;
        if !current.status.can_transition(next) {
            return Err(TenancyError::validation(format!(
                "illegal status transition {} -> {}",
                current.status, next
            )));
        }

        let mut qb = QueryBuilder::new();
        let sql = format!(
            "UPDATE tenants SET status = ${}, updated_at = ${} WHERE id = ${}",
            qb.next_index(),
            qb.next_index() + 1,
            qb.next_index() + 2
        );
        qb.push_value(next.as_str().to_owned());
        qb.push_value(Utc::now().fixed_offset());
        qb.push_value(id);

        let stmt = sea_orm::Statement::from_sql_and_values(
            self.conn.get_database_backend(),
            sql,
            qb.into_values(),
        );

        let result = self
            .conn
            .execute(stmt)
            .await
            .map_err(|source| TenancyError::Persistence { source })?;

        if result.rows_affected() == 0 {
            return Err(TenancyError::not_found("tenant", id));
        }

        self.find_by_id(id).await
    }

    /// Removes the metadata row. Only the provisioning saga calls this, as
    /// the compensation for a failed physical create; the public lifecycle
    /// never deletes rows.
    pub async fn delete_by_id(&self, id: Uuid) -> Result<(), TenancyError> {
        Tenant::delete_by_id(id)
            .exec(self.conn)
            .await
            .map_err(|source| TenancyError::Persistence { source })?;
        Ok(())
    }
}
