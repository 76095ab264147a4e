//! Tenant metadata lifecycle tests against an in-memory database.
//!
//! Physical database provisioning needs Postgres; the engine used here
//! cannot `CREATE DATABASE`, which doubles as a forced failure of the
//! provisioning step and lets the compensation invariant be checked for
//! real.

use serde_json::{Map, Value, json};
use tenancy::models::tenant::TenantStatus;
use tenancy::repositories::{NewTenant, TenantFilter, TenantRepository};
use tenancy::{AppConfig, CreateTenantRequest, MigrationManager, Pool, TenancyError, TenantManager};
use uuid::Uuid;

fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        ..Default::default()
    }
}

async fn setup_pool() -> anyhow::Result<Pool> {
    let cfg = test_config();
    let pool = Pool::connect(&cfg).await?;
    MigrationManager::new(&pool, &cfg).up().await?;
    Ok(pool)
}

fn new_tenant(name: &str) -> NewTenant {
    NewTenant {
        id: Uuid::new_v4(),
        name: name.to_string(),
        display_name: name.to_string(),
        description: String::new(),
        database_name: format!("tenant_{name}"),
        settings: json!({}),
        resource_limits: json!({}),
    }
}

fn field_map(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_insert_and_lookup_round_trip() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());

    let created = repo.insert(new_tenant("acme")).await?;
    assert_eq!(created.status, TenantStatus::Active);
    assert_eq!(created.database_name, "tenant_acme");
    assert_eq!(created.settings, json!({}));
    assert_eq!(created.resource_limits, json!({}));

    let by_id = repo.find_by_id(created.id).await?;
    assert_eq!(by_id.name, "acme");

    let by_name = repo.find_by_name("acme").await?;
    assert_eq!(by_name.id, created.id);

    Ok(())
}

#[tokio::test]
async fn test_lookup_missing_tenant_is_not_found() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());

    let by_id = repo.find_by_id(Uuid::new_v4()).await;
    assert!(matches!(by_id, Err(TenancyError::NotFound { .. })));

    let by_name = repo.find_by_name("ghost").await;
    assert!(matches!(by_name, Err(TenancyError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_name_is_conflict() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());

    repo.insert(new_tenant("acme")).await?;
    let result = repo.insert(new_tenant("acme")).await;

    match result {
        Err(TenancyError::Conflict { name }) => assert_eq!(name, "acme"),
        other => panic!("expected Conflict, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_list_filters_and_paginates() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());

    for name in ["alpha", "beta", "gamma"] {
        repo.insert(new_tenant(name)).await?;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    repo.insert(new_tenant("delta")).await?;
    repo.set_status(
        repo.find_by_name("delta").await?.id,
        TenantStatus::Suspended,
    )
    .await?;

    let all = repo.list(&TenantFilter::default()).await?;
    assert_eq!(all.len(), 4);
    // Creation time descending: the most recent row comes first.
    assert_eq!(all[0].name, "delta");

    let active = repo
        .list(&TenantFilter {
            status: Some(TenantStatus::Active),
            ..Default::default()
        })
        .await?;
    assert_eq!(active.len(), 3);
    assert!(active.iter().all(|t| t.status == TenantStatus::Active));

    let page = repo
        .list(&TenantFilter {
            status: Some(TenantStatus::Active),
            limit: 2,
            offset: 1,
        })
        .await?;
    assert_eq!(page.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_update_respects_allow_list() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());
    let created = repo.insert(new_tenant("acme")).await?;

    // Disallowed key fails the whole update and leaves the row unchanged.
    let result = repo
        .update_fields(
            created.id,
            &field_map(&[
                ("display_name", json!("Acme Inc")),
                ("database_name", json!("tenant_hijack")),
            ]),
        )
        .await;
    match result {
        Err(TenancyError::NotUpdatable { field }) => assert_eq!(field, "database_name"),
        other => panic!("expected NotUpdatable, got {other:?}"),
    }
    let unchanged = repo.find_by_id(created.id).await?;
    assert_eq!(unchanged.display_name, "acme");
    assert_eq!(unchanged.database_name, "tenant_acme");

    // Allow-listed fields apply and stamp updated_at.
    let updated = repo
        .update_fields(
            created.id,
            &field_map(&[
                ("display_name", json!("Acme Inc")),
                ("description", json!("widgets")),
                ("settings", json!({"tier": "gold"})),
                ("resource_limits", json!({"max_connections": 5})),
            ]),
        )
        .await?;
    assert_eq!(updated.display_name, "Acme Inc");
    assert_eq!(updated.description, "widgets");
    assert_eq!(updated.settings, json!({"tier": "gold"}));
    assert_eq!(updated.resource_limits, json!({"max_connections": 5}));
    assert!(updated.updated_at >= created.updated_at);

    Ok(())
}

#[tokio::test]
async fn test_update_missing_tenant_is_not_found() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());

    let result = repo
        .update_fields(Uuid::new_v4(), &field_map(&[("description", json!("x"))]))
        .await;
    assert!(matches!(result, Err(TenancyError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_status_update_enforces_transitions() -> anyhow::Result<()> {
    let pool = setup_pool().await?;
    let repo = TenantRepository::new(pool.conn());
    let created = repo.insert(new_tenant("acme")).await?;

    // active -> suspended -> active is legal, through the field map too.
    let suspended = repo
        .update_fields(created.id, &field_map(&[("status", json!("suspended"))]))
        .await?;
    assert_eq!(suspended.status, TenantStatus::Suspended);
    let resumed = repo.set_status(created.id, TenantStatus::Active).await?;
    assert_eq!(resumed.status, TenantStatus::Active);

    // Jumping straight to terminated is not.
    let result = repo
        .update_fields(created.id, &field_map(&[("status", json!("terminated"))]))
        .await;
    assert!(matches!(result, Err(TenancyError::Validation { .. })));

    Ok(())
}

#[tokio::test]
async fn test_create_tenant_compensates_on_provisioning_failure() -> anyhow::Result<()> {
    let cfg = test_config();
    let pool = Pool::connect(&cfg).await?;
    MigrationManager::new(&pool, &cfg).up().await?;
    let manager = TenantManager::new(pool.clone(), cfg);

    // This engine cannot CREATE DATABASE, so the physical step fails
    // after the metadata insert succeeded.
    let result = manager
        .create_tenant(CreateTenantRequest {
            name: "acme".to_string(),
            display_name: "Acme".to_string(),
            description: String::new(),
            settings: None,
            resource_limits: None,
        })
        .await;
    assert!(matches!(result, Err(TenancyError::Provisioning { .. })));

    // Compensation invariant: no metadata row survives the failure.
    let repo = TenantRepository::new(pool.conn());
    let leftover = repo.find_by_name("acme").await;
    assert!(matches!(leftover, Err(TenancyError::NotFound { .. })));

    Ok(())
}

#[tokio::test]
async fn test_delete_tenant_soft_deletes_and_blocks_pool() -> anyhow::Result<()> {
    let cfg = test_config();
    let pool = Pool::connect(&cfg).await?;
    MigrationManager::new(&pool, &cfg).up().await?;
    let manager = TenantManager::new(pool.clone(), cfg);

    let repo = TenantRepository::new(pool.conn());
    let created = repo.insert(new_tenant("acme")).await?;

    // The physical drop fails on this engine; the logical lifecycle must
    // still complete.
    let deleted = manager.delete_tenant(created.id).await?;
    assert_eq!(deleted.status, TenantStatus::Terminated);

    // The row is retained for audit.
    let retained = manager.get_tenant(created.id).await?;
    assert_eq!(retained.status, TenantStatus::Terminated);

    // No pool for a terminated tenant.
    let result = manager.get_tenant_pool(created.id).await;
    match result {
        Err(TenancyError::InactiveTenant { status, .. }) => assert_eq!(status, "terminated"),
        other => panic!("expected InactiveTenant, got {other:?}"),
    }

    // And nothing leaves terminated.
    let result = manager.delete_tenant(created.id).await;
    assert!(matches!(result, Err(TenancyError::Validation { .. })));

    Ok(())
}

#[tokio::test]
async fn test_repository_works_inside_transaction() -> anyhow::Result<()> {
    let pool = setup_pool().await?;

    // Same repository code runs against the pool or a transaction; an
    // aborted transaction takes the insert with it.
    let record = new_tenant("acme");
    let result: Result<(), TenancyError> = pool
        .with_transaction(move |txn| {
            Box::pin(async move {
                TenantRepository::new(txn).insert(record).await?;
                Err(TenancyError::validation("abort"))
            })
        })
        .await;
    assert!(result.is_err());

    let repo = TenantRepository::new(pool.conn());
    assert!(matches!(
        repo.find_by_name("acme").await,
        Err(TenancyError::NotFound { .. })
    ));

    let record = new_tenant("acme");
    pool.with_transaction(move |txn| {
        Box::pin(async move {
            TenantRepository::new(txn).insert(record).await?;
            Ok(())
        })
    })
    .await?;
    assert_eq!(repo.find_by_name("acme").await?.name, "acme");

    Ok(())
}
