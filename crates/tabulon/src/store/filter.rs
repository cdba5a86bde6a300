use core::fmt;

use serde_json::Value;

/// Pseudo-property name of the partition key in query filters.
pub const PARTITION_KEY: &str = "PartitionKey";
/// Pseudo-property name of the row key in query filters.
pub const ROW_KEY: &str = "RowKey";

/// Comparison operator of a single filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    GreaterThanOrEqual,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => f.write_str("eq"),
            Self::GreaterThanOrEqual => f.write_str("ge"),
        }
    }
}

/// A value compared against a table property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Number(u64),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// A query filter expression over table rows.
///
/// The table service consumes filters as text; [`Filter::to_query_string`]
/// renders the expression the way the service's query syntax spells it, and
/// that rendered length is what the run-length grouper budgets for when many
/// row-key conditions are OR-combined into one query. The in-memory backend
/// evaluates the same tree directly via [`Filter::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Condition {
        column: String,
        comparison: Comparison,
        value: FilterValue,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// An equality condition on one property.
    pub fn equal(column: &str, value: impl Into<FilterValue>) -> Self {
        Self::Condition {
            column: column.to_owned(),
            comparison: Comparison::Equal,
            value: value.into(),
        }
    }

    /// A greater-than-or-equal condition on one property.
    pub fn greater_than_or_equal(column: &str, value: impl Into<FilterValue>) -> Self {
        Self::Condition {
            column: column.to_owned(),
            comparison: Comparison::GreaterThanOrEqual,
            value: value.into(),
        }
    }

    /// Combines two filters so both must hold.
    pub fn and(self, other: Filter) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Combines two filters so either may hold.
    pub fn or(self, other: Filter) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// Renders the filter in the service's textual query syntax.
    ///
    /// Combined sub-expressions are parenthesized, which is why every nested
    /// OR costs a fixed overhead on top of the key itself.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Condition {
                column,
                comparison,
                value,
            } => match value {
                FilterValue::Text(text) => format!("{column} {comparison} '{text}'"),
                FilterValue::Number(number) => format!("{column} {comparison} {number}"),
            },
            Self::And(left, right) => {
                format!(
                    "({}) and ({})",
                    left.to_query_string(),
                    right.to_query_string()
                )
            }
            Self::Or(left, right) => {
                format!(
                    "({}) or ({})",
                    left.to_query_string(),
                    right.to_query_string()
                )
            }
        }
    }

    /// Evaluates the filter against one row.
    ///
    /// `properties` is the row's serialized form; [`PARTITION_KEY`] and
    /// [`ROW_KEY`] are resolved from the key pair rather than the property
    /// bag. A missing property or a type mismatch makes the condition false.
    pub fn matches(&self, partition_key: &str, row_key: &str, properties: &Value) -> bool {
        match self {
            Self::Condition {
                column,
                comparison,
                value,
            } => match value {
                FilterValue::Text(expected) => {
                    let actual = match column.as_str() {
                        PARTITION_KEY => Some(partition_key),
                        ROW_KEY => Some(row_key),
                        _ => properties.get(column).and_then(Value::as_str),
                    };
                    actual.is_some_and(|actual| compare(comparison, actual, expected.as_str()))
                }
                FilterValue::Number(expected) => properties
                    .get(column)
                    .and_then(Value::as_u64)
                    .is_some_and(|actual| compare(comparison, &actual, expected)),
            },
            Self::And(left, right) => {
                left.matches(partition_key, row_key, properties)
                    && right.matches(partition_key, row_key, properties)
            }
            Self::Or(left, right) => {
                left.matches(partition_key, row_key, properties)
                    || right.matches(partition_key, row_key, properties)
            }
        }
    }
}

fn compare<T: PartialOrd + ?Sized>(comparison: &Comparison, actual: &T, expected: &T) -> bool {
    match comparison {
        Comparison::Equal => actual == expected,
        Comparison::GreaterThanOrEqual => actual >= expected,
    }
}
