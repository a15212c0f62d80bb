//! Select queries over stored documents

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

use super::entity::StorageEntity;

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOperator {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn accepts(&self, ordering: Option<Ordering>) -> bool {
        match self {
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Ne => ordering != Some(Ordering::Equal),
            Self::Gt => ordering == Some(Ordering::Greater),
            Self::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt => ordering == Some(Ordering::Less),
            Self::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Typed value a field is compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Compared against RFC 3339 strings in the document
    Timestamp(DateTime<Utc>),
    Null,
}

impl FilterValue {
    /// Compare a document field against this value
    ///
    /// Returns `None` when the field is missing or has an incompatible type.
    fn compare_field(&self, field: Option<&Value>) -> Option<Ordering> {
        let field = field.unwrap_or(&Value::Null);

        match self {
            Self::Null => Some(if field.is_null() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }),
            Self::String(expected) => field.as_str().map(|actual| actual.cmp(expected)),
            Self::Integer(expected) => field.as_i64().map(|actual| actual.cmp(expected)),
            Self::Float(expected) => field.as_f64().and_then(|actual| actual.partial_cmp(expected)),
            Self::Boolean(expected) => field.as_bool().map(|actual| actual.cmp(expected)),
            Self::Timestamp(expected) => parse_timestamp(field).map(|actual| actual.cmp(expected)),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

/// A single `field <op> value` condition on a top-level document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Evaluate the condition against a serialized entity
    pub fn matches(&self, document: &Value) -> bool {
        let field = document.get(&self.field);
        self.operator.accepts(self.value.compare_field(field))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// How the sort field is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKind {
    Text,
    Number,
    Timestamp,
}

/// Ordering applied before the limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub kind: SortKind,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, kind: SortKind, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            kind,
            direction,
        }
    }

    /// Compare two documents; documents lacking the field sort last
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let a = a.get(&self.field);
        let b = b.get(&self.field);

        let ordering = match self.kind {
            SortKind::Text => cmp_present(
                a.and_then(Value::as_str),
                b.and_then(Value::as_str),
                |x, y| x.cmp(y),
            ),
            SortKind::Number => cmp_present(
                a.and_then(Value::as_f64),
                b.and_then(Value::as_f64),
                |x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal),
            ),
            SortKind::Timestamp => cmp_present(
                a.and_then(parse_timestamp),
                b.and_then(parse_timestamp),
                |x, y| x.cmp(y),
            ),
        };

        match (ordering, self.direction) {
            (Present(o), SortDirection::Asc) => o,
            (Present(o), SortDirection::Desc) => o.reverse(),
            (Missing(o), _) => o,
        }
    }
}

enum FieldOrdering {
    Present(Ordering),
    Missing(Ordering),
}

use FieldOrdering::{Missing, Present};

fn cmp_present<T>(
    a: Option<T>,
    b: Option<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> FieldOrdering {
    match (a, b) {
        (Some(a), Some(b)) => Present(cmp(&a, &b)),
        (Some(_), None) => Missing(Ordering::Less),
        (None, Some(_)) => Missing(Ordering::Greater),
        (None, None) => Missing(Ordering::Equal),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Conjunction of conditions with optional ordering and row limit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageQuery {
    pub conditions: Vec<FilterCondition>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl StorageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.conditions
            .push(FilterCondition::new(field, operator, value));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filter(field, FilterOperator::Eq, value)
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filter(field, FilterOperator::Gte, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, kind: SortKind, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy::new(field, kind, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a serialized entity satisfies every condition
    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }

    /// Run the query over an in-process collection of entities
    pub fn apply<E>(&self, entities: impl IntoIterator<Item = E>) -> Result<Vec<E>, DomainError>
    where
        E: StorageEntity,
    {
        let mut documents = Vec::new();

        for entity in entities {
            let document = serde_json::to_value(&entity).map_err(|e| {
                DomainError::storage(format!("Failed to serialize entity: {}", e))
            })?;

            if self.matches(&document) {
                documents.push((document, entity));
            }
        }

        if let Some(ref order) = self.order_by {
            documents.sort_by(|(a, _), (b, _)| order.compare(a, b));
        }

        let limit = self.limit.unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .take(limit)
            .map(|(_, entity)| entity)
            .collect())
    }
}
