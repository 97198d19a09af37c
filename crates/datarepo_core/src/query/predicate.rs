//! Predicate builder: compiles query shapes into executable SQL filters.
//!
//! # Responsibility
//! - Resolve field paths (`town`, `branch.town`) through entity descriptors.
//! - Reject unknown paths and operator/type mismatches before execution.
//! - Render WHERE / ORDER BY fragments and their bind values.
//!
//! # Invariants
//! - A `CompiledQuery` only holds paths that resolved against its entity.
//! - Bound values are checked against the field type before any round-trip.
//! - Ordering always ends with the primary key ascending, so ties keep
//!   insertion order and pages never overlap.

use crate::model::descriptor::{table_alias, EntityDescriptor, FieldDescriptor, MAX_RELATION_DEPTH};
use crate::model::entity::Entity;
use crate::model::value::{encode, FieldType, FieldValue, Rounding};
use crate::query::spec::{Direction, Operator, QuerySpec, SortSpec};
use crate::query::QueryError;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Field path resolved to its relation chain and target column.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPath {
    path: String,
    relations: Vec<&'static str>,
    field: &'static FieldDescriptor,
}

impl ResolvedPath {
    pub(crate) fn resolve(root: &'static EntityDescriptor, path: &str) -> Result<Self, QueryError> {
        let invalid = |segment: &str| QueryError::InvalidFieldPath {
            entity: root.name(),
            path: path.to_string(),
            segment: segment.to_string(),
        };

        let mut segments = path.split('.').collect::<Vec<_>>();
        let field_name = segments.pop().unwrap_or_default();
        if segments.len() > MAX_RELATION_DEPTH {
            return Err(QueryError::RelationDepthExceeded {
                entity: root.name(),
                max: MAX_RELATION_DEPTH,
            });
        }

        let mut current = root;
        let mut relations = Vec::with_capacity(segments.len());
        for segment in segments {
            let relation = current.relation(segment).map_err(|_| invalid(segment))?;
            relations.push(relation.name);
            current = relation.target;
        }
        let field = current.field(field_name).map_err(|_| invalid(field_name))?;

        Ok(Self {
            path: path.to_string(),
            relations,
            field,
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn field_type(&self) -> FieldType {
        self.field.field_type
    }

    /// Qualified column reference below `root_alias`.
    pub(crate) fn column_sql(&self, root_alias: &str) -> String {
        let alias = self
            .relations
            .iter()
            .fold(root_alias.to_string(), |alias, relation| {
                table_alias(&alias, relation)
            });
        format!("{alias}.{}", self.field.column)
    }
}

/// A validated field path rooted at entity `E`, used for aggregates and
/// grouping.
#[derive(Debug, Clone)]
pub struct FieldPath<E> {
    resolved: ResolvedPath,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> FieldPath<E> {
    pub fn compile(path: &str) -> Result<Self, QueryError> {
        Ok(Self {
            resolved: ResolvedPath::resolve(E::descriptor(), path)?,
            _entity: PhantomData,
        })
    }

    pub fn path(&self) -> &str {
        self.resolved.path()
    }

    pub fn field_type(&self) -> FieldType {
        self.resolved.field_type()
    }

    pub(crate) fn resolved(&self) -> &ResolvedPath {
        &self.resolved
    }
}

/// Resolved ordering for entity `E`.
#[derive(Debug, Clone)]
pub struct Sort<E> {
    orders: Vec<(ResolvedPath, Direction)>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Sort<E> {
    /// Natural (insertion) order.
    pub fn unsorted() -> Self {
        Self {
            orders: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn compile(spec: &SortSpec) -> Result<Self, QueryError> {
        let orders = spec
            .orders()
            .iter()
            .map(|order| {
                ResolvedPath::resolve(E::descriptor(), &order.path)
                    .map(|resolved| (resolved, order.direction))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            orders,
            _entity: PhantomData,
        })
    }

    pub(crate) fn order_by_sql(&self, root_alias: &str) -> String {
        let mut keys = self
            .orders
            .iter()
            .map(|(resolved, direction)| {
                let direction = match direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                format!("{} {direction}", resolved.column_sql(root_alias))
            })
            .collect::<Vec<_>>();
        keys.push(format!(
            "{root_alias}.{} ASC",
            E::descriptor().id_field().column
        ));
        format!(" ORDER BY {}", keys.join(", "))
    }
}

#[derive(Debug, Clone)]
struct CompiledClause {
    target: ResolvedPath,
    operator: Operator,
}

impl CompiledClause {
    fn bind(&self, value: &FieldValue) -> Result<Vec<Value>, QueryError> {
        let invalid = |message: String| QueryError::InvalidValue {
            path: self.target.path().to_string(),
            message,
        };

        match self.operator {
            Operator::StartsWith => {
                let FieldValue::Text(prefix) = value else {
                    return Err(invalid(format!(
                        "expected text value, got {}",
                        value.kind_name()
                    )));
                };
                let length = i64::try_from(prefix.chars().count())
                    .map_err(|_| invalid("prefix is too long".to_string()))?;
                Ok(vec![Value::Integer(length), Value::Text(prefix.clone())])
            }
            operator => encode(self.target.field_type(), value, rounding_for(operator))
                .map(|encoded| vec![encoded])
                .map_err(invalid),
        }
    }

    fn condition_sql(&self, root_alias: &str) -> String {
        let column = self.target.column_sql(root_alias);
        match self.operator {
            Operator::Equals => format!("{column} = ?"),
            Operator::NotEquals => format!("{column} <> ?"),
            Operator::GreaterThan => format!("{column} > ?"),
            Operator::GreaterThanOrEqual => format!("{column} >= ?"),
            Operator::LessThan => format!("{column} < ?"),
            Operator::LessThanOrEqual => format!("{column} <= ?"),
            Operator::StartsWith => format!("substr({column}, 1, ?) = ?"),
        }
    }
}

/// Decimal bounds are moved to the side that keeps the comparison exact on
/// minor units.
fn rounding_for(operator: Operator) -> Rounding {
    match operator {
        Operator::GreaterThan | Operator::LessThanOrEqual => Rounding::Floor,
        Operator::GreaterThanOrEqual | Operator::LessThan => Rounding::Ceil,
        Operator::Equals | Operator::NotEquals | Operator::StartsWith => Rounding::Exact,
    }
}

/// A derived query compiled once per shape: validated clauses plus ordering.
#[derive(Debug, Clone)]
pub struct CompiledQuery<E> {
    clauses: Vec<CompiledClause>,
    sort: Sort<E>,
}

impl<E: Entity> CompiledQuery<E> {
    /// Resolves every clause and sort path of `spec` against `E`.
    ///
    /// # Errors
    /// - `InvalidFieldPath` when a path segment does not resolve.
    /// - `UnsupportedOperator` when the operator does not fit the field type.
    pub fn compile(spec: &QuerySpec) -> Result<Self, QueryError> {
        let clauses = spec
            .clauses()
            .iter()
            .map(|clause| {
                let target = ResolvedPath::resolve(E::descriptor(), &clause.path)?;
                if !clause.operator.supports(target.field_type()) {
                    return Err(QueryError::UnsupportedOperator {
                        path: clause.path.clone(),
                        operator: clause.operator,
                        field_type: target.field_type(),
                    });
                }
                Ok(CompiledClause {
                    target,
                    operator: clause.operator,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            clauses,
            sort: Sort::compile(spec.sort())?,
        })
    }

    /// Matches every row in natural order.
    pub fn all() -> Self {
        Self {
            clauses: Vec::new(),
            sort: Sort::unsorted(),
        }
    }

    /// Number of values `bind` expects.
    pub fn arity(&self) -> usize {
        self.clauses.len()
    }

    pub fn sort(&self) -> &Sort<E> {
        &self.sort
    }

    /// Binds one value per clause, in clause order.
    pub fn bind(&self, values: &[FieldValue]) -> Result<Filter<'_, E>, QueryError> {
        if values.len() != self.clauses.len() {
            return Err(QueryError::ParameterCount {
                expected: self.clauses.len(),
                actual: values.len(),
            });
        }

        let values = self
            .clauses
            .iter()
            .zip(values)
            .map(|(clause, value)| clause.bind(value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Filter {
            clauses: &self.clauses,
            values,
            _entity: PhantomData,
        })
    }
}

/// Executable filter: compiled clauses with their bound values.
#[derive(Debug, Clone)]
pub struct Filter<'q, E> {
    clauses: &'q [CompiledClause],
    values: Vec<Vec<Value>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Filter<'static, E> {
    /// Matches every row.
    pub fn all() -> Self {
        Self {
            clauses: &[],
            values: Vec::new(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Filter<'_, E> {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// AND-able conditions and their bind values, in placeholder order.
    pub(crate) fn conditions(&self, root_alias: &str) -> (Vec<String>, Vec<Value>) {
        let conditions = self
            .clauses
            .iter()
            .map(|clause| clause.condition_sql(root_alias))
            .collect();
        let values = self.values.iter().flatten().cloned().collect();
        (conditions, values)
    }
}

#[cfg(test)]
mod tests {
    use super::{CompiledQuery, FieldPath, Filter, ResolvedPath, Sort};
    use crate::model::branch::Branch;
    use crate::model::descriptor::{
        EntityDescriptor, FieldDescriptor, RelationDescriptor, MAX_RELATION_DEPTH,
    };
    use crate::model::employee::Employee;
    use crate::model::value::FieldType;
    use crate::model::value::FieldValue;
    use crate::query::spec::{Direction, Operator, QuerySpec, SortSpec};
    use crate::query::QueryError;
    use rusqlite::types::Value;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn relation_path_renders_joined_alias() {
        let query =
            CompiledQuery::<Employee>::compile(&QuerySpec::new().filter("branch.town", Operator::Equals))
                .unwrap();
        let filter = query.bind(&[FieldValue::from("Brussels")]).unwrap();

        let (conditions, values) = filter.conditions("t0");
        assert_eq!(conditions, ["t0_branch.town = ?"]);
        assert_eq!(values, [Value::Text("Brussels".to_string())]);
    }

    static FOLDER: EntityDescriptor = EntityDescriptor::new(
        "folder",
        "folders",
        FieldDescriptor::new("id", "id", FieldType::Integer),
        &[FieldDescriptor::new("title", "title", FieldType::Text)],
        &[RelationDescriptor::new("parent", "parent_id", &FOLDER)],
    );

    fn nested_path(hops: usize) -> String {
        let mut path = vec!["parent"; hops];
        path.push("title");
        path.join(".")
    }

    #[test]
    fn paths_up_to_the_depth_limit_resolve() {
        let resolved = ResolvedPath::resolve(&FOLDER, &nested_path(MAX_RELATION_DEPTH)).unwrap();
        assert_eq!(
            resolved.column_sql("t0"),
            "t0_parent_parent_parent_parent.title"
        );
    }

    #[test]
    fn paths_past_the_depth_limit_are_rejected() {
        let error = ResolvedPath::resolve(&FOLDER, &nested_path(MAX_RELATION_DEPTH + 1)).unwrap_err();
        assert_eq!(
            error,
            QueryError::RelationDepthExceeded {
                entity: "folder",
                max: MAX_RELATION_DEPTH,
            }
        );
    }

    #[test]
    fn unknown_segments_fail_at_compile_time() {
        let error =
            CompiledQuery::<Employee>::compile(&QuerySpec::new().filter("branch.mayor", Operator::Equals))
                .unwrap_err();
        assert_eq!(
            error,
            QueryError::InvalidFieldPath {
                entity: "employee",
                path: "branch.mayor".to_string(),
                segment: "mayor".to_string(),
            }
        );

        let error = CompiledQuery::<Employee>::compile(
            &QuerySpec::new().filter("department.town", Operator::Equals),
        )
        .unwrap_err();
        assert!(matches!(error, QueryError::InvalidFieldPath { segment, .. } if segment == "department"));
    }

    #[test]
    fn unknown_sort_path_fails_at_compile_time() {
        let spec = QuerySpec::new().order_by("salary", Direction::Ascending);
        assert!(matches!(
            CompiledQuery::<Branch>::compile(&spec),
            Err(QueryError::InvalidFieldPath { .. })
        ));
        assert!(Sort::<Branch>::compile(&SortSpec::by("town")).is_ok());
    }

    #[test]
    fn starts_with_on_decimal_is_unsupported() {
        let error =
            CompiledQuery::<Branch>::compile(&QuerySpec::new().filter("revenue", Operator::StartsWith))
                .unwrap_err();
        assert!(matches!(error, QueryError::UnsupportedOperator { .. }));
    }

    #[test]
    fn starts_with_binds_length_and_prefix() {
        let query = CompiledQuery::<Employee>::compile(
            &QuerySpec::new().filter("first_name", Operator::StartsWith),
        )
        .unwrap();
        let filter = query.bind(&[FieldValue::from("Jé")]).unwrap();
        let (conditions, values) = filter.conditions("t0");
        assert_eq!(conditions, ["substr(t0.first_name, 1, ?) = ?"]);
        assert_eq!(values, [Value::Integer(2), Value::Text("Jé".to_string())]);
    }

    #[test]
    fn bind_checks_arity_and_types() {
        let query = CompiledQuery::<Branch>::compile(
            &QuerySpec::new().filter("revenue", Operator::GreaterThanOrEqual),
        )
        .unwrap();

        assert_eq!(
            query.bind(&[]).unwrap_err(),
            QueryError::ParameterCount {
                expected: 1,
                actual: 0
            }
        );
        assert!(matches!(
            query.bind(&[FieldValue::from("a lot")]),
            Err(QueryError::InvalidValue { .. })
        ));

        let filter = query
            .bind(&[FieldValue::Decimal(Decimal::from_str("1999.995").unwrap())])
            .unwrap();
        let (_, values) = filter.conditions("t0");
        assert_eq!(values, [Value::Integer(200_000)]);
    }

    #[test]
    fn ordering_ends_with_primary_key() {
        let sort = Sort::<Branch>::compile(
            &SortSpec::by("town").then("revenue", Direction::Descending),
        )
        .unwrap();
        assert_eq!(
            sort.order_by_sql("t0"),
            " ORDER BY t0.town ASC, t0.revenue DESC, t0.id ASC"
        );
    }

    #[test]
    fn empty_filter_has_no_conditions() {
        let filter = Filter::<Branch>::all();
        assert!(filter.is_empty());
        assert!(filter.conditions("t0").0.is_empty());
        assert_eq!(FieldPath::<Employee>::compile("branch.revenue").unwrap().path(), "branch.revenue");
    }
}
