//! Per-source business rules.
//!
//! [`transform`] applies one [`Transformer`] to a whole table. It is pure:
//! row count and order are preserved, an empty input gives an empty output
//! with the extended schema, and values that cannot be coerced become null.

pub mod coerce;
pub mod rules;

use tracing::{debug, instrument};

use dwh_shared::{DwhError, Result, Table};

pub use rules::{
    CustomerRules, InvoiceRules, OrderRules, Passthrough, TransactionRules, Transformer,
    transformer_for,
};

/// Apply `transformer` to `table`.
///
/// Fails with a schema contract violation when a required column is missing
/// or a derived column would shadow an existing one.
#[instrument(skip_all, fields(source = %source, rules = transformer.name(), rows = table.len()))]
pub fn transform(transformer: &dyn Transformer, source: &str, table: &Table) -> Result<Table> {
    let schema = table.schema();

    let mut at = Vec::with_capacity(transformer.required_columns().len());
    for column in transformer.required_columns() {
        let idx = schema.index_of(column).ok_or_else(|| {
            DwhError::schema_contract(
                source,
                format!(
                    "missing required column '{column}' (have: {})",
                    schema.columns().join(", ")
                ),
            )
        })?;
        at.push(idx);
    }

    for column in transformer.derived_columns() {
        if schema.index_of(column).is_some() {
            return Err(DwhError::schema_contract(
                source,
                format!("derived column '{column}' already present in input"),
            ));
        }
    }

    let output_schema = schema.extended(transformer.derived_columns().iter().copied());
    let mut rows = Vec::with_capacity(table.len());
    for row in table.rows() {
        let mut row = row.clone();
        let derived = transformer.apply(&mut row, &at);
        row.extend(derived);
        rows.push(row);
    }

    let output = Table::from_rows(output_schema, rows)
        .map_err(|e| DwhError::schema_contract(source, e.to_string()))?;
    debug!(columns = output.schema().len(), "table transformed");
    Ok(output)
}
