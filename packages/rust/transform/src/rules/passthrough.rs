use dwh_shared::{Row, Value};

use super::Transformer;

/// No rules: the table is carried to the report unchanged.
pub struct Passthrough;

impl Transformer for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn required_columns(&self) -> &[&str] {
        &[]
    }

    fn derived_columns(&self) -> &[&str] {
        &[]
    }

    fn apply(&self, _row: &mut Row, _at: &[usize]) -> Vec<Value> {
        Vec::new()
    }
}
