//! Invoices: tax and net value.

use dwh_shared::{Row, Value};
use rust_decimal::Decimal;

use super::{Transformer, coerce_cell};
use crate::coerce::{to_datetime, to_decimal};

pub struct InvoiceRules {
    tax_rate: Decimal,
}

impl InvoiceRules {
    pub fn new(tax_rate: Decimal) -> Self {
        Self { tax_rate }
    }
}

impl Transformer for InvoiceRules {
    fn name(&self) -> &str {
        "invoices"
    }

    fn required_columns(&self) -> &[&str] {
        &["invoice_date", "total_value"]
    }

    fn derived_columns(&self) -> &[&str] {
        &["tax", "net_value"]
    }

    fn apply(&self, row: &mut Row, at: &[usize]) -> Vec<Value> {
        coerce_cell(row, at[0], to_datetime);
        match coerce_cell(row, at[1], to_decimal) {
            Value::Decimal(total) => {
                // Out of decimal range is null, like any other uncomputable value.
                let tax = total.checked_mul(self.tax_rate);
                let net = tax.and_then(|tax| total.checked_add(tax));
                vec![Value::from(tax), Value::from(net)]
            }
            _ => vec![Value::Null, Value::Null],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_configured_tax() {
        let rules = InvoiceRules::new(Decimal::new(18, 2));
        let mut row: Row = vec![Value::Integer(100), "2023-05-06 10:00:00".into()];

        let derived = rules.apply(&mut row, &[1, 0]);

        assert_eq!(row[0], Value::Decimal(Decimal::from(100)));
        assert_eq!(
            derived,
            vec![
                Value::Decimal(Decimal::new(18, 0)),
                Value::Decimal(Decimal::new(118, 0))
            ]
        );
    }

    #[test]
    fn overflowing_totals_become_null() {
        let rules = InvoiceRules::new(Decimal::new(18, 2));
        let mut row: Row = vec!["70000000000000000000000000000".into(), Value::Null];

        let derived = rules.apply(&mut row, &[1, 0]);

        // The tax fits, the net value does not.
        assert!(matches!(derived[0], Value::Decimal(_)));
        assert_eq!(derived[1], Value::Null);

        let rules = InvoiceRules::new(Decimal::from(10));
        let mut row: Row = vec!["10000000000000000000000000000".into(), Value::Null];
        assert_eq!(rules.apply(&mut row, &[1, 0]), vec![Value::Null, Value::Null]);
    }

    #[test]
    fn zero_rate_keeps_value() {
        let rules = InvoiceRules::new(Decimal::ZERO);
        let mut row: Row = vec!["250.40".into(), Value::Null];

        let derived = rules.apply(&mut row, &[1, 0]);

        assert_eq!(derived[1], Value::Decimal(Decimal::new(25040, 2)));
        assert_eq!(row[1], Value::Null);
    }
}
