//! Rule sets, one per transform profile.
//!
//! A rule set names the columns it reads and the columns it derives; the
//! generic [`crate::transform`] resolves the names against the input schema
//! and hands each row to [`Transformer::apply`].

mod customers;
mod invoices;
mod orders;
mod passthrough;
mod transactions;

use dwh_shared::{RulesConfig, Row, TransformProfile, Value};

pub use customers::CustomerRules;
pub use invoices::InvoiceRules;
pub use orders::OrderRules;
pub use passthrough::Passthrough;
pub use transactions::TransactionRules;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Row-level business rules for one kind of source table.
pub trait Transformer: Send + Sync {
    /// Human-readable rule set name for tracing.
    fn name(&self) -> &str;

    /// Input columns the rules read. All must be present.
    fn required_columns(&self) -> &[&str];

    /// Columns appended to every row, in order.
    fn derived_columns(&self) -> &[&str];

    /// Coerce the row's input cells in place and return the derived values.
    ///
    /// `at[i]` is the position of `required_columns()[i]` in the row.
    fn apply(&self, row: &mut Row, at: &[usize]) -> Vec<Value>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Build the rule set for a profile, with business parameters from config.
pub fn transformer_for(profile: TransformProfile, rules: &RulesConfig) -> Box<dyn Transformer> {
    match profile {
        TransformProfile::Transactions => Box::new(TransactionRules),
        TransformProfile::Orders => Box::new(OrderRules),
        TransformProfile::Invoices => Box::new(InvoiceRules::new(rules.tax_rate)),
        TransformProfile::Customers => Box::new(CustomerRules::new(rules.active_since_year)),
        TransformProfile::Passthrough => Box::new(Passthrough),
    }
}

/// Replace the cell at `idx` with its coerced form and return a copy.
pub(crate) fn coerce_cell(row: &mut Row, idx: usize, coerce: fn(&Value) -> Value) -> Value {
    let coerced = coerce(&row[idx]);
    row[idx] = coerced.clone();
    coerced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_profile() {
        let rules = RulesConfig::default();
        let names: Vec<String> = [
            TransformProfile::Transactions,
            TransformProfile::Orders,
            TransformProfile::Invoices,
            TransformProfile::Customers,
            TransformProfile::Passthrough,
        ]
        .into_iter()
        .map(|p| transformer_for(p, &rules).name().to_string())
        .collect();

        assert_eq!(
            names,
            ["transactions", "orders", "invoices", "customers", "passthrough"]
        );
    }
}
