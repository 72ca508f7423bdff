use dwh_shared::{Row, Value};

use super::{Transformer, coerce_cell};
use crate::coerce::{to_datetime, year_of};

/// Customers are active when they signed up in or after a cutoff year.
pub struct CustomerRules {
    active_since_year: i32,
}

impl CustomerRules {
    pub fn new(active_since_year: i32) -> Self {
        Self { active_since_year }
    }
}

impl Transformer for CustomerRules {
    fn name(&self) -> &str {
        "customers"
    }

    fn required_columns(&self) -> &[&str] {
        &["signup_date"]
    }

    fn derived_columns(&self) -> &[&str] {
        &["is_active"]
    }

    fn apply(&self, row: &mut Row, at: &[usize]) -> Vec<Value> {
        let signup = coerce_cell(row, at[0], to_datetime);
        let active = year_of(&signup).is_some_and(|year| year >= self.active_since_year);
        vec![Value::Bool(active)]
    }
}
