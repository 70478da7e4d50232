use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::env;

use time_cop::db::*;
use time_cop::models::{Category, ExtractedActivity, StoredSession};
use time_cop::store::RecordStore;

/// Helper macro to skip tests when database is not available
macro_rules! skip_if_no_db {
    ($test_fn:expr) => {
        match setup_test_db().await {
            Ok(pool) => $test_fn(PgStore::new(pool)).await,
            Err(_) => {
                eprintln!("Skipping test: Database not available");
                Ok(())
            }
        }
    };
}

async fn setup_test_db() -> Result<PgPool> {
    // Skip tests if no DATABASE_URL is provided
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping database tests: DATABASE_URL not set");
            return Err(anyhow::anyhow!("Test database not configured"));
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to test database")?;

    // Initialize schema
    init_database_schema(&pool).await?;

    Ok(pool)
}

/// Tests share one database, so each works under its own owner id
async fn reset_owner(store: &PgStore, owner: i64) -> Result<()> {
    sqlx::query("DELETE FROM registros_tiempo WHERE usuario_telegram_id = $1")
        .bind(owner)
        .execute(store.pool())
        .await?;
    sqlx::query("DELETE FROM estados_usuarios WHERE telegram_id = $1")
        .bind(owner)
        .execute(store.pool())
        .await?;
    Ok(())
}

fn activity(project: &str, category: Category, hours: f64) -> ExtractedActivity {
    ExtractedActivity {
        description: format!("Trabajo en {project}"),
        project: project.to_string(),
        category,
        hours,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_schema_init_is_idempotent() -> Result<()> {
    skip_if_no_db!(test_schema_init_is_idempotent_impl)
}

async fn test_schema_init_is_idempotent_impl(store: PgStore) -> Result<()> {
    init_database_schema(store.pool()).await?;
    init_database_schema(store.pool()).await?;
    store.ping().await?;
    Ok(())
}

#[tokio::test]
async fn test_insert_and_query_records() -> Result<()> {
    skip_if_no_db!(test_insert_and_query_records_impl)
}

async fn test_insert_and_query_records_impl(store: PgStore) -> Result<()> {
    let owner = 910_001;
    reset_owner(&store, owner).await?;
    let day = date(2026, 2, 17);

    let inserted = store
        .insert_batch(
            owner,
            day,
            &[
                activity("General", Category::OtherNonBillable, 0.5),
                activity("Alpha", Category::BillableProject, 7.25),
            ],
            Some("daily 0.5h, alpha 7.25h"),
        )
        .await?;
    assert_eq!(inserted.len(), 2);
    assert!(inserted.iter().all(|r| r.owner == owner && r.date == day));

    let fetched = store.records_on(owner, day).await?;
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].project, "General");
    assert_eq!(fetched[1].project, "Alpha");
    assert_eq!(fetched[1].hours, 7.25);
    assert_eq!(fetched[1].category, Category::BillableProject);
    assert_eq!(fetched[0].raw_text.as_deref(), Some("daily 0.5h, alpha 7.25h"));
    assert!(fetched[0].created_at <= fetched[1].created_at);

    assert!(store.records_on(owner, date(2026, 2, 18)).await?.is_empty());
    assert!(store.records_on(owner + 1, day).await?.is_empty());

    reset_owner(&store, owner).await?;
    Ok(())
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() -> Result<()> {
    skip_if_no_db!(test_batch_is_all_or_nothing_impl)
}

async fn test_batch_is_all_or_nothing_impl(store: PgStore) -> Result<()> {
    let owner = 910_002;
    reset_owner(&store, owner).await?;
    let day = date(2026, 2, 17);

    let result = store
        .insert_batch(
            owner,
            day,
            &[
                activity("Alpha", Category::BillableProject, 4.0),
                activity("Beta", Category::NonBillableProject, 30.0),
            ],
            None,
        )
        .await;

    assert!(result.is_err());
    assert!(store.records_on(owner, day).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_is_owner_scoped() -> Result<()> {
    skip_if_no_db!(test_delete_is_owner_scoped_impl)
}

async fn test_delete_is_owner_scoped_impl(store: PgStore) -> Result<()> {
    let owner = 910_003;
    reset_owner(&store, owner).await?;
    let day = date(2026, 2, 17);

    let inserted = store
        .insert_batch(owner, day, &[activity("Alpha", Category::BillableProject, 2.0)], None)
        .await?;
    let id = inserted[0].id;

    assert!(!store.delete_record(id, owner + 1).await?);
    assert_eq!(store.records_on(owner, day).await?.len(), 1);

    assert!(store.delete_record(id, owner).await?);
    assert!(!store.delete_record(id, owner).await?);
    assert!(store.records_on(owner, day).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_range_and_month_queries() -> Result<()> {
    skip_if_no_db!(test_range_and_month_queries_impl)
}

async fn test_range_and_month_queries_impl(store: PgStore) -> Result<()> {
    let owner = 910_004;
    reset_owner(&store, owner).await?;

    for day in [date(2026, 1, 31), date(2026, 2, 1), date(2026, 2, 28), date(2026, 3, 1)] {
        store
            .insert_batch(owner, day, &[activity("Alpha", Category::BillableProject, 1.0)], None)
            .await?;
    }

    let february = store.records_in_month(owner, 2026, 2).await?;
    let dates: Vec<NaiveDate> = february.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![date(2026, 2, 1), date(2026, 2, 28)]);

    let range = store
        .records_between(owner, date(2026, 1, 31), date(2026, 2, 1))
        .await?;
    assert_eq!(range.len(), 2);
    assert_eq!(range[0].date, date(2026, 1, 31));

    reset_owner(&store, owner).await?;
    Ok(())
}

#[tokio::test]
async fn test_session_mirror_upsert() -> Result<()> {
    skip_if_no_db!(test_session_mirror_upsert_impl)
}

async fn test_session_mirror_upsert_impl(store: PgStore) -> Result<()> {
    let owner = 910_005;
    reset_owner(&store, owner).await?;

    assert!(store.load_session(owner).await?.is_none());

    let first = StoredSession {
        owner,
        step: "awaiting_date".to_string(),
        payload: json!({ "flow": "register_other_day" }),
        updated_at: Utc::now(),
    };
    store.save_session(&first).await?;

    let second = StoredSession {
        step: "awaiting_activities".to_string(),
        payload: json!({ "flow": "register_other_day", "data": { "target_date": "2026-02-10" } }),
        ..first.clone()
    };
    store.save_session(&second).await?;

    let loaded = store.load_session(owner).await?.expect("session should be stored");
    assert_eq!(loaded.step, "awaiting_activities");
    assert_eq!(loaded.payload, second.payload);

    store.clear_session(owner).await?;
    assert!(store.load_session(owner).await?.is_none());
    Ok(())
}
