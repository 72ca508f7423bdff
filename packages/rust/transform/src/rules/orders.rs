use dwh_shared::{Row, Value};

use super::{Transformer, coerce_cell};
use crate::coerce::{to_datetime, to_integer};

pub struct OrderRules;

impl Transformer for OrderRules {
    fn name(&self) -> &str {
        "orders"
    }

    fn required_columns(&self) -> &[&str] {
        &["order_date", "quantity"]
    }

    fn derived_columns(&self) -> &[&str] {
        &["total_items"]
    }

    fn apply(&self, row: &mut Row, at: &[usize]) -> Vec<Value> {
        coerce_cell(row, at[0], to_datetime);
        vec![to_integer(&row[at[1]])]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn total_items_truncates_quantity() {
        let mut row: Row = vec![Value::Decimal(Decimal::new(35, 1)), "01-FEB-2022".into()];

        let derived = OrderRules.apply(&mut row, &[1, 0]);

        assert_eq!(derived, vec![Value::Integer(3)]);
        // Quantity itself is left as read.
        assert_eq!(row[0], Value::Decimal(Decimal::new(35, 1)));
        assert_eq!(row[1].to_string(), "2022-02-01 00:00:00");
    }
}
