//! Caller-built query shapes: clauses, sort orders and page requests.

use crate::model::value::FieldType;
use crate::query::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Comparison applied by one predicate clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Case-sensitive prefix match; text fields only.
    StartsWith,
}

impl Operator {
    /// Returns whether this operator can be applied to `field_type`.
    pub fn supports(self, field_type: FieldType) -> bool {
        match self {
            Self::StartsWith => field_type == FieldType::Text,
            _ => true,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::GreaterThanOrEqual => "greater_than_or_equal",
            Self::LessThan => "less_than",
            Self::LessThanOrEqual => "less_than_or_equal",
            Self::StartsWith => "starts_with",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One predicate: a field path (`town`, `branch.town`) and its operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub path: String,
    pub operator: Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub path: String,
    pub direction: Direction,
}

/// Ordered list of sort keys. Earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    orders: Vec<SortOrder>,
}

impl SortSpec {
    pub fn unsorted() -> Self {
        Self::default()
    }

    /// Sorts ascending by `path`.
    pub fn by(path: impl Into<String>) -> Self {
        Self::default().then(path, Direction::Ascending)
    }

    pub fn then(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(SortOrder {
            path: path.into(),
            direction,
        });
        self
    }

    pub fn orders(&self) -> &[SortOrder] {
        &self.orders
    }
}

/// Shape of a derived query: AND-combined clauses plus sort keys.
///
/// Values are supplied per execution when the compiled query is bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    clauses: Vec<Clause>,
    sort: SortSpec,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, path: impl Into<String>, operator: Operator) -> Self {
        self.clauses.push(Clause {
            path: path.into(),
            operator,
        });
        self
    }

    pub fn order_by(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.sort = self.sort.then(path, direction);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }
}

/// Zero-based page index plus a positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    index: u32,
    size: u32,
}

impl PageRequest {
    /// Validates and creates a page request.
    ///
    /// # Errors
    /// - `InvalidPageRequest` when `size` is zero.
    pub fn of(index: u32, size: u32) -> Result<Self, QueryError> {
        if size == 0 {
            return Err(QueryError::InvalidPageRequest(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { index, size })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of rows before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Operator, PageRequest, QuerySpec, SortSpec};
    use crate::model::value::FieldType;

    #[test]
    fn starts_with_is_text_only() {
        assert!(Operator::StartsWith.supports(FieldType::Text));
        assert!(!Operator::StartsWith.supports(FieldType::Integer));
        assert!(!Operator::StartsWith.supports(FieldType::Decimal { scale: 2 }));
        assert!(Operator::GreaterThanOrEqual.supports(FieldType::Text));
    }

    #[test]
    fn page_request_rejects_zero_size() {
        assert!(PageRequest::of(0, 0).is_err());
        let page = PageRequest::of(3, 25).unwrap();
        assert_eq!(page.offset(), 75);
    }

    #[test]
    fn query_spec_keeps_clause_and_sort_order() {
        let spec = QuerySpec::new()
            .filter("town", Operator::Equals)
            .filter("revenue", Operator::GreaterThan)
            .order_by("name", Direction::Descending);

        let paths: Vec<_> = spec.clauses().iter().map(|clause| clause.path.as_str()).collect();
        assert_eq!(paths, ["town", "revenue"]);
        assert_eq!(spec.sort().orders()[0].direction, Direction::Descending);
        assert!(SortSpec::unsorted().orders().is_empty());
    }
}
