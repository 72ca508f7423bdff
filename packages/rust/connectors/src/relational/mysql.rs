use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row as _, TypeInfo};
use tracing::debug;

use dwh_shared::{DwhError, Result, Row, ServerConnection, Value};

const DEFAULT_PORT: u16 = 3306;

pub(super) async fn fetch_rows(source: &str, config: &ServerConnection) -> Result<Vec<Row>> {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port.unwrap_or(DEFAULT_PORT))
        .database(&config.database)
        .username(&config.user);
    if let Some(password) = config.password() {
        options = options.password(&password);
    }

    let mut conn = MySqlConnection::connect_with(&options).await.map_err(|e| {
        DwhError::source_unavailable(source, format!("connect to {}: {e}", config.host))
    })?;

    let result = sqlx::query(&config.query).fetch_all(&mut conn).await;
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing mysql connection failed");
    }

    let rows = result.map_err(|e| DwhError::source_unavailable(source, format!("query: {e}")))?;
    rows.iter().map(|row| decode_row(source, row)).collect()
}

fn decode_row(source: &str, row: &MySqlRow) -> Result<Row> {
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

fn decode_value(row: &MySqlRow, idx: usize) -> std::result::Result<Value, sqlx::Error> {
    let type_name = row.column(idx).type_info().name();
    let value = match type_name {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(idx)?.map(Value::Integer)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(idx)?.map(unsigned),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| Value::Float(v.into())),
        "DOUBLE" => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
        "DECIMAL" => row.try_get::<Option<Decimal>, _>(idx)?.map(Value::Decimal),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.map(Value::Date),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)?
            .map(Value::DateTime),
        _ => row.try_get::<Option<String>, _>(idx)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Unsigned values beyond `i64::MAX` keep full precision as decimals.
fn unsigned(v: u64) -> Value {
    i64::try_from(v)
        .map(Value::Integer)
        .unwrap_or_else(|_| Value::Decimal(Decimal::from(v)))
}
