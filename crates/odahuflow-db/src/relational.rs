//! PostgreSQL repository
//!
//! One table per resource kind, each row `(id TEXT PRIMARY KEY, spec JSONB,
//! status JSONB)`. Filters become `= ANY($n)` predicates over JSON paths and
//! pagination is a plain `LIMIT/OFFSET` window ordered by ID.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::QueryBuilder;
use std::marker::PhantomData;
use tracing::{debug, info, instrument};

use odahuflow_core::{
    ListOptions, Modifiable, Repository, Resource, ResourceError, ResourceFilter, ResourceResult,
};

use crate::error::translate_sqlx_error;
use crate::pagination::offset_window;

type Row = (String, Json<Value>, Json<Value>);

/// [`Repository`] over a PostgreSQL table
#[derive(Clone)]
pub struct PostgresRepository<R> {
    pool: PgPool,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> PostgresRepository<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _resource: PhantomData,
        }
    }
}

/// `SELECT` for one page of `R`, filtered
pub fn list_query<R: Resource>(options: &ListOptions<R::Filter>) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT id, spec, status FROM {}", R::TABLE));

    for (i, criterion) in options.active_filter().criteria().into_iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push(criterion.field.column);
        query.push(" = ANY(");
        query.push_bind(criterion.values.to_vec());
        query.push(")");
    }

    let (limit, offset) = offset_window(options);
    query.push(" ORDER BY id LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);
    query
}

fn select_one_sql<R: Resource>() -> String {
    format!("SELECT id, spec, status FROM {} WHERE id = $1", R::TABLE)
}

fn insert_sql<R: Resource>() -> String {
    format!("INSERT INTO {} (id, spec, status) VALUES ($1, $2, $3)", R::TABLE)
}

/// Replace the spec, keep the stored status and refresh its `updatedAt`
fn update_sql<R: Resource>() -> String {
    format!(
        "UPDATE {} SET spec = $2, \
         status = jsonb_set(coalesce(status, '{{}}'::jsonb), '{{updatedAt}}', to_jsonb($3::text)) \
         WHERE id = $1 RETURNING id, spec, status",
        R::TABLE
    )
}

fn delete_sql<R: Resource>() -> String {
    format!("DELETE FROM {} WHERE id = $1", R::TABLE)
}

fn from_row<R: Resource>((id, Json(spec), Json(status)): Row) -> ResourceResult<R> {
    let status = if status.is_null() { json!({}) } else { status };
    serde_json::from_value(json!({ "id": id, "spec": spec, "status": status })).map_err(|err| {
        ResourceError::unavailable(format!("validation of {} {} is failed: {}", R::KIND, id, err))
    })
}

fn split<R: Resource>(resource: &R) -> ResourceResult<(Value, Value)> {
    let mut value = serde_json::to_value(resource)?;
    let spec = value.get_mut("spec").map(Value::take).unwrap_or(Value::Null);
    let status = value
        .get_mut("status")
        .map(Value::take)
        .unwrap_or_else(|| json!({}));
    Ok((spec, status))
}

#[async_trait]
impl<R: Resource> Repository<R> for PostgresRepository<R> {
    #[instrument(skip(self), fields(table = R::TABLE))]
    async fn get(&self, id: &str) -> ResourceResult<R> {
        let row: Option<Row> = sqlx::query_as(&select_one_sql::<R>())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| translate_sqlx_error(err, id))?;

        match row {
            Some(row) => from_row(row),
            None => Err(ResourceError::not_found(id)),
        }
    }

    #[instrument(skip(self, options), fields(table = R::TABLE, page = options.page_number(), size = options.page_size()))]
    async fn list(&self, options: ListOptions<R::Filter>) -> ResourceResult<Vec<R>> {
        let mut query = list_query::<R>(&options);
        debug!(sql = query.sql(), "listing rows");

        let rows: Vec<Row> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|err| translate_sqlx_error(err, R::TABLE))?;

        rows.into_iter().map(from_row).collect()
    }

    #[instrument(skip(self, resource), fields(table = R::TABLE, id = resource.id()))]
    async fn create(&self, resource: &mut R) -> ResourceResult<()> {
        *resource.modifiable_mut() = Modifiable::created(Utc::now());
        let (spec, status) = split(resource)?;

        sqlx::query(&insert_sql::<R>())
            .bind(resource.id())
            .bind(Json(spec))
            .bind(Json(status))
            .execute(&self.pool)
            .await
            .map_err(|err| translate_sqlx_error(err, resource.id()))?;

        info!("row inserted");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(table = R::TABLE, id = resource.id()))]
    async fn update(&self, resource: &mut R) -> ResourceResult<()> {
        let id = resource.id().to_string();
        let (spec, _) = split(resource)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true);

        let row: Option<Row> = sqlx::query_as(&update_sql::<R>())
            .bind(&id)
            .bind(Json(spec))
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| translate_sqlx_error(err, &id))?;

        match row {
            Some(row) => {
                *resource = from_row(row)?;
                info!("row updated");
                Ok(())
            }
            None => Err(ResourceError::not_found(id)),
        }
    }

    #[instrument(skip(self), fields(table = R::TABLE))]
    async fn delete(&self, id: &str) -> ResourceResult<()> {
        let result = sqlx::query(&delete_sql::<R>())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| translate_sqlx_error(err, id))?;

        if result.rows_affected() == 0 {
            return Err(ResourceError::not_found(id));
        }
        info!("row deleted");
        Ok(())
    }
}

/// Apply the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
