//! Cross-source aggregation: named collection plus one summary row.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use dwh_shared::{
    AppConfig, DwhError, NamedCollection, REVENUE_FIELD, Result, SummaryRecord, Table, Value,
};

/// Which summary fields to compute and where revenue comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySpec {
    /// `(source, label)` pairs; each yields `label = row count`.
    pub counts: Vec<(String, String)>,
    pub revenue_source: String,
    pub revenue_column: String,
}

impl SummarySpec {
    /// Count every configured source, in configured order.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            counts: config
                .sources
                .iter()
                .map(|s| (s.name.clone(), s.summary_label()))
                .collect(),
            revenue_source: config.revenue.source.clone(),
            revenue_column: config.revenue.column.clone(),
        }
    }
}

/// Merge transformed tables and compute the summary.
///
/// Only row counts and the revenue column are read.
#[instrument(skip_all, fields(tables = tables.len(), revenue_source = %spec.revenue_source))]
pub fn aggregate(
    tables: Vec<(String, Table)>,
    spec: &SummarySpec,
) -> Result<(NamedCollection, SummaryRecord)> {
    let mut collection = NamedCollection::new();
    for (name, table) in tables {
        if collection.get(&name).is_some() {
            return Err(DwhError::aggregation(name, "source appears twice"));
        }
        collection.insert(name, table)?;
    }

    let mut summary = SummaryRecord::new();
    for (source, label) in &spec.counts {
        let table = collection.get(source).ok_or_else(|| {
            DwhError::aggregation(source.as_str(), "no table to count for the summary")
        })?;
        let count = i64::try_from(table.len()).unwrap_or(i64::MAX);
        summary.push(label.as_str(), count);
    }

    let revenue_table = collection.get(&spec.revenue_source).ok_or_else(|| {
        DwhError::aggregation(spec.revenue_source.as_str(), "revenue source has no table")
    })?;
    let total = sum_column(&spec.revenue_source, revenue_table, &spec.revenue_column)?;
    summary.push(REVENUE_FIELD, total);

    debug!(fields = summary.fields().len(), %total, "summary computed");
    Ok((collection, summary))
}

/// Sum a numeric column, skipping nulls. An empty table sums to zero.
fn sum_column(source: &str, table: &Table, column: &str) -> Result<Decimal> {
    let values = table.column(column).ok_or_else(|| {
        DwhError::aggregation(source, format!("revenue column '{column}' not found"))
    })?;

    let mut total = Decimal::ZERO;
    for value in values {
        let amount = match value {
            Value::Null => continue,
            Value::Decimal(d) => *d,
            Value::Integer(i) => Decimal::from(*i),
            Value::Float(f) => Decimal::try_from(*f).map_err(|e| {
                DwhError::aggregation(
                    source,
                    format!("revenue value {f} is not representable: {e}"),
                )
            })?,
            other => {
                return Err(DwhError::aggregation(
                    source,
                    format!(
                        "revenue column '{column}' holds non-numeric {} value '{other}'",
                        other.type_name()
                    ),
                ));
            }
        };
        total = total.checked_add(amount).ok_or_else(|| {
            DwhError::aggregation(source, format!("revenue column '{column}' overflows"))
        })?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwh_shared::Schema;

    fn table(column: &str, values: Vec<Value>) -> Table {
        Table::from_rows(
            Schema::new(["id", column]),
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| vec![Value::Integer(i as i64), v])
                .collect(),
        )
        .unwrap()
    }

    fn spec() -> SummarySpec {
        SummarySpec {
            counts: vec![
                ("a".into(), "total_a".into()),
                ("b".into(), "total_b".into()),
                ("c".into(), "total_c".into()),
            ],
            revenue_source: "c".into(),
            revenue_column: "net_value".into(),
        }
    }

    #[test]
    fn counts_match_row_counts_for_every_combination() {
        for mask in 0..8u8 {
            let rows = |bit: u8, n: usize| -> Vec<Value> {
                if mask & bit == 0 { Vec::new() } else { vec![Value::Integer(1); n] }
            };
            let tables = vec![
                ("a".to_string(), table("x", rows(1, 3))),
                ("b".to_string(), table("x", rows(2, 1))),
                ("c".to_string(), table("net_value", rows(4, 2))),
            ];
            let expected: Vec<i64> = tables.iter().map(|(_, t)| t.len() as i64).collect();

            let (collection, summary) = aggregate(tables, &spec()).unwrap();

            assert_eq!(collection.len(), 3);
            for (label, count) in ["total_a", "total_b", "total_c"].iter().zip(expected) {
                assert_eq!(summary.get(label), Some(&Value::Integer(count)), "mask {mask}");
            }
        }
    }

    #[test]
    fn empty_revenue_table_sums_to_zero() {
        let tables = vec![
            ("a".to_string(), table("x", Vec::new())),
            ("b".to_string(), table("x", Vec::new())),
            ("c".to_string(), table("net_value", Vec::new())),
        ];

        let (_, summary) = aggregate(tables, &spec()).unwrap();

        assert_eq!(summary.get(REVENUE_FIELD), Some(&Value::Decimal(Decimal::ZERO)));
        assert_eq!(summary.fields().last().unwrap().0, REVENUE_FIELD);
    }

    #[test]
    fn revenue_skips_nulls_and_mixes_numeric_types() {
        let tables = vec![
            ("a".to_string(), table("x", Vec::new())),
            ("b".to_string(), table("x", Vec::new())),
            (
                "c".to_string(),
                table(
                    "net_value",
                    vec![
                        Value::Decimal(Decimal::new(11800, 2)),
                        Value::Null,
                        Value::Integer(236),
                        Value::Float(0.5),
                    ],
                ),
            ),
        ];

        let (_, summary) = aggregate(tables, &spec()).unwrap();

        assert_eq!(
            summary.get(REVENUE_FIELD),
            Some(&Value::Decimal(Decimal::new(3545, 1)))
        );
    }

    #[test]
    fn missing_revenue_column_fails_aggregation() {
        let tables = vec![
            ("a".to_string(), table("x", Vec::new())),
            ("b".to_string(), table("x", Vec::new())),
            ("c".to_string(), table("gross", Vec::new())),
        ];

        let err = aggregate(tables, &spec()).unwrap_err();
        assert!(matches!(err, DwhError::Aggregation { .. }));
        assert!(err.to_string().contains("net_value"));
    }

    #[test]
    fn text_revenue_fails_aggregation() {
        let tables = vec![
            ("a".to_string(), table("x", Vec::new())),
            ("b".to_string(), table("x", Vec::new())),
            ("c".to_string(), table("net_value", vec!["lots".into()])),
        ];

        let err = aggregate(tables, &spec()).unwrap_err();
        assert!(err.to_string().contains("non-numeric text"));
    }

    #[test]
    fn duplicate_table_names_are_rejected() {
        let tables = vec![
            ("a".to_string(), table("x", Vec::new())),
            ("a".to_string(), table("x", Vec::new())),
        ];
        let err = aggregate(tables, &spec()).unwrap_err();
        assert_eq!(err.stage(), dwh_shared::Stage::Aggregate);
    }
}
