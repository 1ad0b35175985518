//! PostgreSQL implementation of the catalog and survey stores.
//!
//! Each request runs on one pooled connection held by a [`PgSession`].
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`). Column
//! names come from request paths, so they are sanitized before being
//! interpolated; every other value is bound.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tokio::sync::Mutex;

use crate::catalog::{CatalogStore, LabelDictionary, Variable};
use crate::data::{sanitize_identifier, CodedColumn, GeoObservation, JoinedColumns, SurveyStore};
use crate::error::{DashboardError, Result};
use crate::geometry::GeoUnit;
use crate::runtime::{Session, Store};

/// Postgres error codes for a missing column and a missing table
const UNDEFINED_COLUMN: &str = "42703";
const UNDEFINED_TABLE: &str = "42P01";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn session(&self) -> Result<Box<dyn Session>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession { conn: Mutex::new(conn) }))
    }
}

/// Queries for one request; the connection returns to the pool on drop
pub struct PgSession {
    conn: Mutex<PoolConnection<Postgres>>,
}

async fn variable_id(conn: &mut PgConnection, variable: &str) -> Result<i32> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM variables WHERE name = $1 LIMIT 1")
        .bind(variable)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DashboardError::VariableNotFound(variable.to_string()))
}

/// Sanitized column name; a name with nothing left cannot exist
fn column_name(variable: &str) -> Result<String> {
    let column = sanitize_identifier(variable);
    if column.is_empty() {
        return Err(DashboardError::VariableNotFound(variable.to_string()));
    }
    Ok(column)
}

/// Translate "no such column/table" into `VariableNotFound`
fn missing_as_not_found(variable: &str) -> impl FnOnce(sqlx::Error) -> DashboardError + '_ {
    move |err| {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };
        match code.as_deref() {
            Some(UNDEFINED_COLUMN) | Some(UNDEFINED_TABLE) => DashboardError::VariableNotFound(variable.to_string()),
            _ => DashboardError::Storage(err),
        }
    }
}

#[async_trait]
impl CatalogStore for PgSession {
    async fn lookup_dictionary(&self, variable: &str) -> Result<LabelDictionary> {
        let mut conn = self.conn.lock().await;
        let id = variable_id(&mut **conn, variable).await?;

        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT CAST(key AS BIGINT), value
            FROM mappings
            WHERE variable_id = $1 AND key IS NOT NULL AND value IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut **conn)
        .await?;

        tracing::debug!(variable, entries = rows.len(), "Loaded label dictionary");
        Ok(LabelDictionary::from_pairs(rows))
    }

    async fn lookup_description(&self, variable: &str) -> Result<String> {
        let mut conn = self.conn.lock().await;
        let description = sqlx::query_scalar::<_, Option<String>>(
            "SELECT description FROM variables WHERE name = $1 LIMIT 1",
        )
        .bind(variable)
        .fetch_optional(&mut **conn)
        .await?
        .ok_or_else(|| DashboardError::VariableNotFound(variable.to_string()))?;

        Ok(description.unwrap_or_default())
    }

    async fn list_variables(&self) -> Result<Vec<Variable>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT name, description FROM variables ORDER BY id",
        )
        .fetch_all(&mut **conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, description)| Variable { name, description })
            .collect())
    }
}

#[async_trait]
impl SurveyStore for PgSession {
    async fn fetch_column(&self, variable: &str) -> Result<CodedColumn> {
        let column = column_name(variable)?;
        let sql = format!("SELECT CAST({column} AS BIGINT) FROM data WHERE {column} IS NOT NULL");

        let mut conn = self.conn.lock().await;
        let codes = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_all(&mut **conn)
            .await
            .map_err(missing_as_not_found(variable))?;

        tracing::debug!(variable = %column, rows = codes.len(), "Fetched column");
        Ok(CodedColumn::new(column, codes))
    }

    async fn fetch_joined_columns(&self, first: &str, second: &str) -> Result<JoinedColumns> {
        let a = column_name(first)?;
        let b = column_name(second)?;
        let sql = format!(
            "SELECT CAST({a} AS BIGINT), CAST({b} AS BIGINT) FROM data WHERE {a} IS NOT NULL AND {b} IS NOT NULL"
        );

        let mut conn = self.conn.lock().await;
        let rows = sqlx::query_as::<_, (i64, i64)>(&sql)
            .fetch_all(&mut **conn)
            .await
            .map_err(|err| {
                let first_missing = missing_as_not_found(first)(err);
                // Postgres does not say which column is missing; report both
                match first_missing {
                    DashboardError::VariableNotFound(_) => {
                        DashboardError::VariableNotFound(format!("{} or {}", first, second))
                    }
                    other => other,
                }
            })?;

        tracing::debug!(first = %a, second = %b, rows = rows.len(), "Fetched joined columns");
        Ok(JoinedColumns::new(a, b, rows))
    }

    async fn fetch_geo_column(&self, variable: &str) -> Result<Vec<GeoObservation>> {
        let column = column_name(variable)?;
        let sql = format!(
            "SELECT CAST(pdet AS TEXT), CAST({column} AS BIGINT) FROM data WHERE {column} > -1 AND pdet IS NOT NULL"
        );

        let mut conn = self.conn.lock().await;
        let rows = sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&mut **conn)
            .await
            .map_err(missing_as_not_found(variable))?;

        tracing::debug!(variable = %column, rows = rows.len(), "Fetched geo column");
        Ok(rows
            .into_iter()
            .map(|(pdet, value)| GeoObservation { pdet, value })
            .collect())
    }

    async fn fetch_geo_units(&self) -> Result<Vec<GeoUnit>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT CAST(pdet AS TEXT), geostring FROM geodata WHERE pdet IS NOT NULL AND geostring IS NOT NULL",
        )
        .fetch_all(&mut **conn)
        .await?;

        rows.iter()
            .map(|(pdet, wkt)| GeoUnit::from_wkt(pdet.as_str(), wkt))
            .collect()
    }
}
