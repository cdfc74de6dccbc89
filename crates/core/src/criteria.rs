//! Compiles a validated filter set into the record-store criteria syntax.
//!
//! Pure and deterministic: identical input always yields a byte-identical
//! expression. Filters render in input order with no deduplication.

use crate::filter::{Filter, ValueNode};

/// Render a filter list as a criteria expression.
///
/// A single filter renders unwrapped; two or more are joined with ` and `
/// and wrapped once: `((a) and (b))`.
pub fn compile(filters: &[Filter]) -> String {
    let parts = filters.iter().map(render_filter).collect::<Vec<_>>();
    match parts.len() {
        0 => String::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(" and ")),
    }
}

fn render_filter(filter: &Filter) -> String {
    format!("({}:{}:{})", filter.key, filter.value.operator.as_str(), render_value(&filter.value.value))
}

fn render_value(value: &ValueNode) -> String {
    match value {
        ValueNode::One(scalar) => scalar.to_string(),
        ValueNode::Many(scalars) => {
            scalars.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        }
    }
}
