use std::path::Path;

use libsql::params;

use dwh_shared::{DwhError, Result, Row, SqliteConnection, Value};

pub(super) async fn fetch_rows(source: &str, config: &SqliteConnection) -> Result<Vec<Row>> {
    let path = Path::new(&config.path);
    // Opening a missing path would create an empty database.
    if !path.is_file() {
        return Err(DwhError::source_unavailable(
            source,
            format!("database file {} not found", path.display()),
        ));
    }

    let unavailable = |e: libsql::Error| DwhError::source_unavailable(source, e.to_string());

    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(unavailable)?;
    let conn = db.connect().map_err(unavailable)?;

    let mut rows = conn
        .query(&config.query, params![])
        .await
        .map_err(unavailable)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(unavailable)? {
        let width = row.column_count();
        let mut values = Vec::with_capacity(usize::try_from(width).unwrap_or_default());
        for idx in 0..width {
            values.push(decode_value(row.get_value(idx).map_err(unavailable)?));
        }
        out.push(values);
    }
    Ok(out)
}

fn decode_value(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Integer(i),
        libsql::Value::Real(f) => Value::Float(f),
        libsql::Value::Text(s) => Value::Text(s),
        libsql::Value::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn seeded_db() -> PathBuf {
        let path = std::env::temp_dir().join(format!("dwh-sqlite-{}.db", uuid::Uuid::now_v7()));
        let db = libsql::Builder::new_local(&path).build().await.unwrap();
        let conn = db.connect().unwrap();
        conn.execute(
            "CREATE TABLE orders (order_id INTEGER, customer TEXT, quantity REAL, note TEXT)",
            params![],
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO orders VALUES (1, 'acme', 2.0, NULL), (2, 'globex', 5.5, 'rush')",
            params![],
        )
        .await
        .unwrap();
        path
    }

    #[tokio::test]
    async fn reads_all_rows_in_order() {
        let path = seeded_db().await;
        let config = SqliteConnection {
            path: path.to_string_lossy().into_owned(),
            query: "SELECT order_id, customer, quantity, note FROM orders ORDER BY order_id".into(),
        };

        let rows = fetch_rows("orders", &config).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            vec![
                Value::Integer(1),
                Value::Text("acme".into()),
                Value::Float(2.0),
                Value::Null
            ]
        );
        assert_eq!(rows[1][3], Value::Text("rush".into()));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn sample_config_reads_fixture_database() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../..");
        let config = dwh_shared::load_config_from(&root.join("fixtures/config/dwh-report.toml"))
            .unwrap();
        let dwh_shared::ConnectionConfig::Sqlite(sqlite) = config.sources[0].connection.clone()
        else {
            panic!("first sample source should be sqlite");
        };
        let sqlite = SqliteConnection {
            path: root.join(&sqlite.path).to_string_lossy().into_owned(),
            ..sqlite
        };

        let rows = fetch_rows("transactions", &sqlite).await.unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][1], Value::Text("Northwind Traders".into()));
        assert_eq!(rows[3][2], Value::Null);
    }

    #[tokio::test]
    async fn missing_file_is_unavailable_and_not_created() {
        let path = std::env::temp_dir().join(format!("dwh-missing-{}.db", uuid::Uuid::now_v7()));
        let config = SqliteConnection {
            path: path.to_string_lossy().into_owned(),
            query: "SELECT 1".into(),
        };

        let err = fetch_rows("orders", &config).await.unwrap_err();

        assert!(err.to_string().contains("not found"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn bad_query_is_unavailable() {
        let path = seeded_db().await;
        let config = SqliteConnection {
            path: path.to_string_lossy().into_owned(),
            query: "SELECT * FROM no_such_table".into(),
        };

        let err = fetch_rows("orders", &config).await.unwrap_err();
        assert!(matches!(err, DwhError::SourceUnavailable { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
