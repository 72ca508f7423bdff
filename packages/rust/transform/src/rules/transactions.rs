//! Payment transactions.

use dwh_shared::{Row, Value};
use rust_decimal::Decimal;

use super::{Transformer, coerce_cell};
use crate::coerce::{to_datetime, to_decimal};

/// Only one currency is carried, so the USD rate is fixed at 1.
const USD_RATE: Decimal = Decimal::ONE;

pub struct TransactionRules;

impl Transformer for TransactionRules {
    fn name(&self) -> &str {
        "transactions"
    }

    fn required_columns(&self) -> &[&str] {
        &["transaction_date", "amount"]
    }

    fn derived_columns(&self) -> &[&str] {
        &["amount_usd"]
    }

    fn apply(&self, row: &mut Row, at: &[usize]) -> Vec<Value> {
        coerce_cell(row, at[0], to_datetime);
        let amount_usd = match coerce_cell(row, at[1], to_decimal) {
            Value::Decimal(amount) => Value::Decimal(amount * USD_RATE),
            _ => Value::Null,
        };
        vec![amount_usd]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_amount_and_date() {
        let mut row: Row = vec!["1".into(), "12.5".into(), "2021-01-02".into()];

        let derived = TransactionRules.apply(&mut row, &[2, 1]);

        assert_eq!(row[1], Value::Decimal(Decimal::new(125, 1)));
        assert_eq!(row[2].to_string(), "2021-01-02 00:00:00");
        assert_eq!(derived, vec![Value::Decimal(Decimal::new(125, 1))]);
    }

    #[test]
    fn bad_amount_gives_null_usd() {
        let mut row: Row = vec!["oops".into(), Value::Null];
        let derived = TransactionRules.apply(&mut row, &[1, 0]);
        assert_eq!(row[0], Value::Null);
        assert_eq!(derived, vec![Value::Null]);
    }
}
