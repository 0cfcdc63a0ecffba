//! Row filters shared by every backend.
//!
//! Values are carried as text, the way they travel in a PostgREST query string.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value as JsonValue;

use super::Row;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq { column: String, value: String },
    In { column: String, values: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Conjunction of conditions plus an optional ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: Vec<Condition>,
    order: Option<Order>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `id = <id>`.
    pub fn by_id(id: impl ToString) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.conditions.push(Condition::Eq {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    /// Evaluate the conditions against a row.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| match c {
            Condition::Eq { column, value } => {
                row.get(column).is_some_and(|v| text_of(v).as_deref() == Some(value.as_str()))
            }
            Condition::In { column, values } => row
                .get(column)
                .and_then(text_of)
                .is_some_and(|v| values.iter().any(|candidate| *candidate == v)),
        })
    }

    /// Sort rows according to the ordering, if any.
    pub fn sort(&self, rows: &mut [Row]) {
        let Some(order) = &self.order else {
            return;
        };
        rows.sort_by(|a, b| {
            let ord = compare_json(a.get(&order.column), b.get(&order.column));
            match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
    }
}

/// Textual form of a scalar column value (`NULL` has none).
fn text_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    match (a, b) {
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => {
            // Timestamps serialize with a variable number of fractional digits,
            // so they do not sort correctly as plain text.
            match (
                DateTime::<FixedOffset>::parse_from_rfc3339(x),
                DateTime::<FixedOffset>::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        // NULLs last, like Postgres' default for ascending order.
        (None | Some(JsonValue::Null), None | Some(JsonValue::Null)) => Ordering::Equal,
        (None | Some(JsonValue::Null), _) => Ordering::Greater,
        (_, None | Some(JsonValue::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
