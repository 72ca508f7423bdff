use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row as _, TypeInfo};
use tracing::debug;

use dwh_shared::{DwhError, Result, Row, ServerConnection, Value};

const DEFAULT_PORT: u16 = 5432;

pub(super) async fn fetch_rows(source: &str, config: &ServerConnection) -> Result<Vec<Row>> {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port.unwrap_or(DEFAULT_PORT))
        .database(&config.database)
        .username(&config.user);
    if let Some(password) = config.password() {
        options = options.password(&password);
    }

    let mut conn = PgConnection::connect_with(&options).await.map_err(|e| {
        DwhError::source_unavailable(source, format!("connect to {}: {e}", config.host))
    })?;

    let result = sqlx::query(&config.query).fetch_all(&mut conn).await;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing postgres connection failed");
    }

    let rows = result.map_err(|e| DwhError::source_unavailable(source, format!("query: {e}")))?;
    rows.iter().map(|row| decode_row(source, row)).collect()
}

fn decode_row(source: &str, row: &PgRow) -> Result<Row> {
    (0..row.len())
        .map(|idx| {
            decode_value(row, idx).map_err(|e| {
                DwhError::source_unavailable(
                    source,
                    format!("decode column '{}': {e}", row.column(idx).name()),
                )
            })
        })
        .collect()
}

fn decode_value(row: &PgRow, idx: usize) -> std::result::Result<Value, sqlx::Error> {
    let value = match row.column(idx).type_info().name() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::Integer(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Value::Integer(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::Integer),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| Value::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(idx)?.map(Value::Decimal),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.map(Value::Date),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(Value::DateTime),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)?
            .map(|v| Value::DateTime(v.naive_utc())),
        _ => row.try_get::<Option<String>, _>(idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}
