//! # PostgreSQL Store
//!
//! [`RecordStore`] implementation over a `sqlx` connection pool.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Category, ExtractedActivity, StoredSession, TimeRecord};
use crate::store::RecordStore;

const RECORD_COLUMNS: &str = "id, fecha, usuario_telegram_id, descripcion, proyecto, categoria, \
     horas_estimadas::float8 AS horas_estimadas, texto_original, created_at, updated_at";

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS registros_tiempo (
            id UUID PRIMARY KEY,
            fecha DATE NOT NULL,
            usuario_telegram_id BIGINT NOT NULL,
            descripcion TEXT NOT NULL CHECK (length(trim(descripcion)) > 0),
            proyecto VARCHAR(255) NOT NULL CHECK (length(trim(proyecto)) > 0),
            categoria VARCHAR(50) NOT NULL
                CHECK (categoria IN ('proyectoFacturable', 'proyectoNoFacturable', 'otrosNoFacturable')),
            horas_estimadas NUMERIC(5, 2) NOT NULL
                CHECK (horas_estimadas > 0 AND horas_estimadas <= 24),
            texto_original TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create registros_tiempo table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_registros_usuario_fecha
         ON registros_tiempo (usuario_telegram_id, fecha)",
    )
    .execute(pool)
    .await
    .context("Failed to create registros_tiempo index")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS estados_usuarios (
            telegram_id BIGINT PRIMARY KEY,
            estado VARCHAR(50) NOT NULL,
            datos_temporales JSONB NOT NULL DEFAULT '{}'::jsonb,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create estados_usuarios table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    fecha: NaiveDate,
    usuario_telegram_id: i64,
    descripcion: String,
    proyecto: String,
    categoria: String,
    horas_estimadas: f64,
    texto_original: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for TimeRecord {
    type Error = anyhow::Error;

    fn try_from(row: RecordRow) -> Result<Self> {
        let category: Category = row.categoria.parse().map_err(|e: String| anyhow!(e))?;
        Ok(TimeRecord {
            id: row.id,
            owner: row.usuario_telegram_id,
            date: row.fecha,
            description: row.descripcion,
            project: row.proyecto,
            category,
            hours: row.horas_estimadas,
            raw_text: row.texto_original,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<RecordRow>) -> Result<Vec<TimeRecord>> {
    rows.into_iter().map(TimeRecord::try_from).collect()
}

#[derive(Debug, FromRow)]
struct SessionRow {
    telegram_id: i64,
    estado: String,
    datos_temporales: serde_json::Value,
    updated_at: DateTime<Utc>,
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_batch(
        &self,
        owner: i64,
        date: NaiveDate,
        activities: &[ExtractedActivity],
        raw_text: Option<&str>,
    ) -> Result<Vec<TimeRecord>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin insert transaction")?;

        let query = format!(
            "INSERT INTO registros_tiempo
                (id, fecha, usuario_telegram_id, descripcion, proyecto, categoria,
                 horas_estimadas, texto_original, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, CAST($7 AS float8)::numeric, $8,
                     clock_timestamp(), clock_timestamp())
             RETURNING {RECORD_COLUMNS}"
        );

        let mut rows = Vec::with_capacity(activities.len());
        for activity in activities {
            let row: RecordRow = sqlx::query_as(&query)
                .bind(Uuid::new_v4())
                .bind(date)
                .bind(owner)
                .bind(&activity.description)
                .bind(&activity.project)
                .bind(activity.category.as_key())
                .bind(activity.hours)
                .bind(raw_text)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to insert time record")?;
            rows.push(row);
        }

        // Dropping the transaction on an early return rolls it back
        tx.commit().await.context("Failed to commit time records")?;

        info!(user_id = owner, count = rows.len(), %date, "Time records created");
        into_records(rows)
    }

    async fn records_on(&self, owner: i64, date: NaiveDate) -> Result<Vec<TimeRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM registros_tiempo
             WHERE usuario_telegram_id = $1 AND fecha = $2
             ORDER BY created_at ASC"
        ))
        .bind(owner)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch records by date")?;

        debug!(user_id = owner, %date, count = rows.len(), "Fetched records for date");
        into_records(rows)
    }

    async fn records_between(&self, owner: i64, from: NaiveDate, to: NaiveDate) -> Result<Vec<TimeRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM registros_tiempo
             WHERE usuario_telegram_id = $1 AND fecha BETWEEN $2 AND $3
             ORDER BY fecha ASC, created_at ASC"
        ))
        .bind(owner)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch records by range")?;

        debug!(user_id = owner, %from, %to, count = rows.len(), "Fetched records for range");
        into_records(rows)
    }

    async fn records_in_month(&self, owner: i64, year: i32, month: u32) -> Result<Vec<TimeRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM registros_tiempo
             WHERE usuario_telegram_id = $1
               AND EXTRACT(YEAR FROM fecha)::int = $2
               AND EXTRACT(MONTH FROM fecha)::int = $3
             ORDER BY fecha ASC, created_at ASC"
        ))
        .bind(owner)
        .bind(year)
        .bind(month as i32)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch records by month")?;

        debug!(user_id = owner, year, month, count = rows.len(), "Fetched records for month");
        into_records(rows)
    }

    async fn delete_record(&self, id: Uuid, owner: i64) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM registros_tiempo WHERE id = $1 AND usuario_telegram_id = $2",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .context("Failed to delete time record")?;

        let deleted = result.rows_affected() > 0;
        info!(user_id = owner, record_id = %id, deleted, "Delete requested");
        Ok(deleted)
    }

    async fn save_session(&self, session: &StoredSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO estados_usuarios (telegram_id, estado, datos_temporales, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (telegram_id)
             DO UPDATE SET estado = EXCLUDED.estado,
                           datos_temporales = EXCLUDED.datos_temporales,
                           updated_at = EXCLUDED.updated_at",
        )
        .bind(session.owner)
        .bind(&session.step)
        .bind(&session.payload)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert user state")?;
        Ok(())
    }

    async fn load_session(&self, owner: i64) -> Result<Option<StoredSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT telegram_id, estado, datos_temporales, updated_at
             FROM estados_usuarios WHERE telegram_id = $1",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user state")?;

        Ok(row.map(|r| StoredSession {
            owner: r.telegram_id,
            step: r.estado,
            payload: r.datos_temporales,
            updated_at: r.updated_at,
        }))
    }

    async fn clear_session(&self, owner: i64) -> Result<()> {
        sqlx::query("DELETE FROM estados_usuarios WHERE telegram_id = $1")
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("Failed to clear user state")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }
}
