use dwh_shared::{DwhError, OracleConnection, Result, Row};

/// Oracle's client library is blocking, so the whole session runs on the
/// blocking pool.
#[cfg(feature = "oracle")]
pub(super) async fn fetch_rows(source: &str, config: &OracleConnection) -> Result<Vec<Row>> {
    let owned_source = source.to_string();
    let config = config.clone();
    tokio::task::spawn_blocking(move || session::fetch_blocking(&owned_source, &config))
        .await
        .map_err(|e| DwhError::source_unavailable(source, format!("oracle worker: {e}")))?
}

#[cfg(not(feature = "oracle"))]
pub(super) async fn fetch_rows(source: &str, config: &OracleConnection) -> Result<Vec<Row>> {
    Err(DwhError::source_unavailable(
        source,
        format!(
            "cannot reach {}: built without Oracle support (rebuild with --features oracle)",
            config.connect_string
        ),
    ))
}

#[cfg(feature = "oracle")]
mod session {
    use chrono::NaiveDateTime;
    use ::oracle::sql_type::OracleType;
    use ::oracle::{Connection, SqlValue};
    use rust_decimal::Decimal;
    use tracing::debug;

    use dwh_shared::{DwhError, OracleConnection, Result, Row, Value};

    pub(super) fn fetch_blocking(source: &str, config: &OracleConnection) -> Result<Vec<Row>> {
        let password = config.password().unwrap_or_default();
        let conn = Connection::connect(&config.user, &password, &config.connect_string).map_err(
            |e| {
                DwhError::source_unavailable(
                    source,
                    format!("connect to {}: {e}", config.connect_string),
                )
            },
        )?;

        let result = read_all(&conn, &config.query);
        if let Err(e) = conn.close() {
            debug!(error = %e, "closing oracle connection failed");
        }
        result.map_err(|e| DwhError::source_unavailable(source, format!("query: {e}")))
    }

    fn read_all(conn: &Connection, query: &str) -> ::oracle::Result<Vec<Row>> {
        let mut out = Vec::new();
        for row in conn.query(query, &[])? {
            let row = row?;
            let values = row
                .sql_values()
                .iter()
                .map(decode_value)
                .collect::<::oracle::Result<Row>>()?;
            out.push(values);
        }
        Ok(out)
    }

    fn decode_value(value: &SqlValue) -> ::oracle::Result<Value> {
        if value.is_null()? {
            return Ok(Value::Null);
        }
        let decoded = match value.oracle_type()? {
            OracleType::Number(_, _)
            | OracleType::Float(_)
            | OracleType::BinaryFloat
            | OracleType::BinaryDouble => {
                let text: String = value.get()?;
                text.parse::<Decimal>()
                    .map(Value::Decimal)
                    .unwrap_or(Value::Text(text))
            }
            OracleType::Date
            | OracleType::Timestamp(_)
            | OracleType::TimestampTZ(_)
            | OracleType::TimestampLTZ(_) => Value::DateTime(value.get::<NaiveDateTime>()?),
            _ => Value::Text(value.get::<String>()?),
        };
        Ok(decoded)
    }
}

#[cfg(all(test, not(feature = "oracle")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn without_feature_reports_unavailable() {
        let config = OracleConnection {
            connect_string: "localhost/XE".into(),
            user: "oracle_user".into(),
            password_env: None,
            query: "SELECT * FROM orders".into(),
        };

        let err = fetch_rows("orders", &config).await.unwrap_err();

        assert!(matches!(err, DwhError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("--features oracle"));
    }
}
