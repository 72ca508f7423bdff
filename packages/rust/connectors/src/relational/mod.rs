//! Relational connectors.
//!
//! Each dialect module opens a connection, runs the configured query, decodes
//! every row into [`Value`]s and releases the connection before returning.
//! Materializing into the declared schema happens here so every dialect
//! shares the same width check.

mod mysql;
mod oracle;
mod postgres;
mod sqlite;

use std::fmt;

use dwh_shared::{
    DwhError, OracleConnection, Result, Row, Schema, ServerConnection, SqliteConnection, Table,
};

/// SQL dialect of a relational source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Oracle,
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Oracle => "oracle",
            Self::Sqlite => "sqlite",
        })
    }
}

/// A relational source: one dialect plus its connection parameters.
#[derive(Debug, Clone)]
pub enum RelationalConnector {
    Postgres(ServerConnection),
    Mysql(ServerConnection),
    Oracle(OracleConnection),
    Sqlite(SqliteConnection),
}

impl RelationalConnector {
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::Mysql(_) => Dialect::Mysql,
            Self::Oracle(_) => Dialect::Oracle,
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Run the configured query and materialize its full result set.
    pub async fn fetch(&self, source: &str, schema: &Schema) -> Result<Table> {
        let rows = match self {
            Self::Postgres(c) => postgres::fetch_rows(source, c).await?,
            Self::Mysql(c) => mysql::fetch_rows(source, c).await?,
            Self::Oracle(c) => oracle::fetch_rows(source, c).await?,
            Self::Sqlite(c) => sqlite::fetch_rows(source, c).await?,
        };
        materialize(source, schema, rows)
    }
}

/// Check the result width against the declared columns and build the table.
fn materialize(source: &str, schema: &Schema, rows: Vec<Row>) -> Result<Table> {
    if let Some(first) = rows.first() {
        if first.len() != schema.len() {
            return Err(DwhError::source_unavailable(
                source,
                format!(
                    "query returned {} columns but {} are declared ({})",
                    first.len(),
                    schema.len(),
                    schema.columns().join(", ")
                ),
            ));
        }
    }
    Table::from_rows(schema.clone(), rows)
        .map_err(|e| DwhError::source_unavailable(source, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwh_shared::Value;

    #[test]
    fn materialize_checks_width() {
        let schema = Schema::new(["id", "amount"]);

        let table = materialize(
            "tx",
            &schema,
            vec![vec![Value::Integer(1), Value::Float(2.5)]],
        )
        .unwrap();
        assert_eq!(table.len(), 1);

        let err = materialize("tx", &schema, vec![vec![Value::Integer(1)]]).unwrap_err();
        assert!(err.to_string().contains("query returned 1 columns but 2 are declared"));
    }

    #[test]
    fn empty_result_keeps_schema() {
        let table = materialize("tx", &Schema::new(["id"]), Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.schema().columns(), ["id"]);
    }

    #[test]
    fn dialect_names() {
        let conn = RelationalConnector::Sqlite(SqliteConnection {
            path: "a.db".into(),
            query: "SELECT 1".into(),
        });
        assert_eq!(conn.dialect(), Dialect::Sqlite);
        assert_eq!(Dialect::Mysql.to_string(), "mysql");
    }
}
