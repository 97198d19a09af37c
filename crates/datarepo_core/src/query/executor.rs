//! Query executor: runs compiled filters against SQLite.
//!
//! # Responsibility
//! - Build SELECT / COUNT / aggregate statements from descriptors and filters.
//! - Eagerly join every declared relation and materialize typed entities.
//!
//! # Invariants
//! - The executor never opens, commits or rolls back; it only borrows the
//!   caller's connection (or transaction).
//! - `fetch_page` counts with the same filter as the slice, count first.
//! - Bound values are never logged.

use crate::model::descriptor::{
    column_alias, nested_prefix, table_alias, EntityDescriptor, MAX_RELATION_DEPTH,
};
use crate::model::entity::{Entity, EntityId, EntityRow};
use crate::model::value::{decimal_from_minor, FieldType, FieldValue};
use crate::query::aggregate::{AggregateKind, AggregateValue, GroupCount};
use crate::query::page::Page;
use crate::query::predicate::{FieldPath, Filter, ResolvedPath, Sort};
use crate::query::spec::PageRequest;
use crate::query::QueryError;
use crate::repo::{RepoError, RepoResult};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeSet;
use std::time::Instant;

const ROOT_ALIAS: &str = "t0";
const MAX_GROUP_ALIAS: &str = "m0";
const MAX_IDS_PER_STATEMENT: usize = 500;

/// Runs filter + sort + pagination + aggregation for any entity shape.
pub struct QueryExecutor<'conn> {
    conn: &'conn Connection,
}

impl<'conn> QueryExecutor<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Counts rows matching `filter`.
    pub fn count<E: Entity>(&self, filter: &Filter<'_, E>) -> RepoResult<u64> {
        observe::<E, _>("count", || self.count_rows(filter), |count| *count)
    }

    /// Returns every matching entity in `sort` order.
    pub fn fetch_all<E: Entity>(&self, filter: &Filter<'_, E>, sort: &Sort<E>) -> RepoResult<Vec<E>> {
        observe::<E, _>(
            "fetch_all",
            || {
                let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
                let (conditions, values) = filter.conditions(ROOT_ALIAS);
                let sql = format!(
                    "{}{}{}",
                    projection.select_sql(),
                    where_sql(&conditions),
                    sort.order_by_sql(ROOT_ALIAS)
                );
                self.query_entities(&sql, values)
            },
            |entities| entities.len() as u64,
        )
    }

    /// Returns one page of matching entities plus navigation flags.
    ///
    /// A page past the end yields empty content, never an error.
    pub fn fetch_page<E: Entity>(
        &self,
        filter: &Filter<'_, E>,
        sort: &Sort<E>,
        page: PageRequest,
    ) -> RepoResult<Page<E>> {
        observe::<E, _>(
            "fetch_page",
            || {
                let total = self.count_rows(filter)?;
                if page.offset() >= total {
                    return Ok(Page::new(Vec::new(), page, total));
                }
                // offset < total <= i64::MAX here
                let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

                let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
                let (conditions, mut values) = filter.conditions(ROOT_ALIAS);
                let sql = format!(
                    "{}{}{} LIMIT ? OFFSET ?",
                    projection.select_sql(),
                    where_sql(&conditions),
                    sort.order_by_sql(ROOT_ALIAS)
                );
                values.push(Value::Integer(i64::from(page.size())));
                values.push(Value::Integer(offset));

                let content = self.query_entities(&sql, values)?;
                Ok(Page::new(content, page, total))
            },
            |page| page.content().len() as u64,
        )
    }

    /// Computes `kind` over `field` for rows matching `filter`.
    ///
    /// # Errors
    /// - `UnsupportedAggregate` when a scalar kind targets a text field.
    pub fn fetch_scalar_aggregate<E: Entity>(
        &self,
        filter: &Filter<'_, E>,
        kind: AggregateKind,
        field: &FieldPath<E>,
    ) -> RepoResult<AggregateValue<E>> {
        let target = field.resolved();
        if kind.requires_numeric() && !target.field_type().is_numeric() {
            return Err(QueryError::UnsupportedAggregate {
                path: target.path().to_string(),
                kind,
                field_type: target.field_type(),
            }
            .into());
        }

        observe::<E, _>(
            "aggregate",
            || match kind {
                AggregateKind::MaxGroup => {
                    self.max_group(filter, target).map(AggregateValue::Entities)
                }
                AggregateKind::Average => {
                    let (count, sum) = self.exact_sum(filter, target)?;
                    let average = match count {
                        0 => None,
                        _ => Some(average(sum, count, target)?),
                    };
                    Ok(AggregateValue::Scalar(average))
                }
                AggregateKind::Sum => {
                    let (count, sum) = self.exact_sum(filter, target)?;
                    let sum = match count {
                        0 => None,
                        _ => Some(numeric_from_storage(sum, target)?),
                    };
                    Ok(AggregateValue::Scalar(sum))
                }
                AggregateKind::Min | AggregateKind::Max => {
                    let function = match kind {
                        AggregateKind::Min => "MIN",
                        _ => "MAX",
                    };
                    let value = self
                        .scalar(filter, target, function)?
                        .map(|stored| numeric_from_storage(i128::from(stored), target))
                        .transpose()?;
                    Ok(AggregateValue::Scalar(value))
                }
            },
            |value| match value {
                AggregateValue::Scalar(value) => u64::from(value.is_some()),
                AggregateValue::Entities(entities) => entities.len() as u64,
            },
        )
    }

    /// Counts matching rows per distinct value of `field`, ordered by value.
    pub fn count_grouped<E: Entity>(
        &self,
        filter: &Filter<'_, E>,
        field: &FieldPath<E>,
    ) -> RepoResult<Vec<GroupCount>> {
        observe::<E, _>(
            "count_grouped",
            || {
                let target = field.resolved();
                let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
                let (conditions, values) = filter.conditions(ROOT_ALIAS);
                let column = target.column_sql(ROOT_ALIAS);
                let sql = format!(
                    "SELECT {column} AS group_key, COUNT(*) AS group_count
                     FROM {}{}
                     GROUP BY {column}
                     ORDER BY {column} ASC",
                    projection.from,
                    where_sql(&conditions)
                );

                let mut stmt = self.conn.prepare(&sql)?;
                let mut rows = stmt.query(params_from_iter(values))?;
                let mut groups = Vec::new();
                while let Some(row) = rows.next()? {
                    let count: i64 = row.get("group_count")?;
                    groups.push(GroupCount {
                        key: group_key(row, target)?,
                        count: to_count(count)?,
                    });
                }
                Ok(groups)
            },
            |groups| groups.len() as u64,
        )
    }

    /// Loads one entity by primary key; absence is not an error.
    pub fn by_id<E: Entity>(&self, id: EntityId) -> RepoResult<Option<E>> {
        observe::<E, _>(
            "by_id",
            || {
                let descriptor = E::descriptor();
                let projection = Projection::of(descriptor, ROOT_ALIAS)?;
                let sql = format!(
                    "{} WHERE {ROOT_ALIAS}.{} = ?",
                    projection.select_sql(),
                    descriptor.id_field().column
                );
                let entities = self.query_entities(&sql, vec![Value::Integer(id)])?;
                Ok(entities.into_iter().next())
            },
            |entity| u64::from(entity.is_some()),
        )
    }

    /// Loads the subset of `ids` that exists, without duplicates, by id.
    pub fn by_ids<E: Entity>(&self, ids: impl IntoIterator<Item = EntityId>) -> RepoResult<Vec<E>> {
        let ids = ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        observe::<E, _>(
            "by_ids",
            || {
                let descriptor = E::descriptor();
                let projection = Projection::of(descriptor, ROOT_ALIAS)?;
                let id_column = descriptor.id_field().column;
                let mut entities = Vec::with_capacity(ids.len());

                for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
                    let placeholders = vec!["?"; chunk.len()].join(", ");
                    let sql = format!(
                        "{} WHERE {ROOT_ALIAS}.{id_column} IN ({placeholders})
                         ORDER BY {ROOT_ALIAS}.{id_column} ASC",
                        projection.select_sql()
                    );
                    let values = chunk.iter().map(|id| Value::Integer(*id)).collect();
                    entities.extend(self.query_entities::<E>(&sql, values)?);
                }

                Ok(entities)
            },
            |entities| entities.len() as u64,
        )
    }

    fn count_rows<E: Entity>(&self, filter: &Filter<'_, E>) -> RepoResult<u64> {
        let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
        let (conditions, values) = filter.conditions(ROOT_ALIAS);
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            projection.from,
            where_sql(&conditions)
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        to_count(count)
    }

    /// Returns `function(column)` over matching rows.
    fn scalar<E: Entity>(
        &self,
        filter: &Filter<'_, E>,
        target: &ResolvedPath,
        function: &str,
    ) -> RepoResult<Option<i64>> {
        let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
        let (conditions, values) = filter.conditions(ROOT_ALIAS);
        let column = target.column_sql(ROOT_ALIAS);
        let sql = format!(
            "SELECT {function}({column}) FROM {}{}",
            projection.from,
            where_sql(&conditions)
        );
        let value: Option<i64> = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(value)
    }

    /// Returns `(non-null count, sum)` of stored values over matching rows.
    ///
    /// Values are added in `i128` so sums of storable values cannot overflow.
    fn exact_sum<E: Entity>(
        &self,
        filter: &Filter<'_, E>,
        target: &ResolvedPath,
    ) -> RepoResult<(u64, i128)> {
        let projection = Projection::of(E::descriptor(), ROOT_ALIAS)?;
        let (mut conditions, values) = filter.conditions(ROOT_ALIAS);
        let column = target.column_sql(ROOT_ALIAS);
        conditions.push(format!("{column} IS NOT NULL"));
        let sql = format!(
            "SELECT {column} FROM {}{}",
            projection.from,
            where_sql(&conditions)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let (mut count, mut sum) = (0u64, 0i128);
        while let Some(row) = rows.next()? {
            let stored: i64 = row.get(0)?;
            count += 1;
            sum = sum.checked_add(i128::from(stored)).ok_or_else(|| {
                RepoError::InvalidData(format!("sum of `{}` overflows", target.path()))
            })?;
        }
        Ok((count, sum))
    }

    /// Single statement: matching rows whose value equals the filtered maximum.
    fn max_group<E: Entity>(&self, filter: &Filter<'_, E>, target: &ResolvedPath) -> RepoResult<Vec<E>> {
        let descriptor = E::descriptor();
        let outer = Projection::of(descriptor, ROOT_ALIAS)?;
        let inner = Projection::of(descriptor, MAX_GROUP_ALIAS)?;

        let (mut conditions, mut values) = filter.conditions(ROOT_ALIAS);
        let (inner_conditions, inner_values) = filter.conditions(MAX_GROUP_ALIAS);
        conditions.push(format!(
            "{} = (SELECT MAX({}) FROM {}{})",
            target.column_sql(ROOT_ALIAS),
            target.column_sql(MAX_GROUP_ALIAS),
            inner.from,
            where_sql(&inner_conditions)
        ));
        values.extend(inner_values);

        let sql = format!(
            "{}{}{}",
            outer.select_sql(),
            where_sql(&conditions),
            Sort::<E>::unsorted().order_by_sql(ROOT_ALIAS)
        );
        self.query_entities(&sql, values)
    }

    fn query_entities<E: Entity>(&self, sql: &str, values: Vec<Value>) -> RepoResult<Vec<E>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            entities.push(E::from_row(&EntityRow::root(row, E::descriptor()))?);
        }

        Ok(entities)
    }
}

/// SELECT list and FROM clause (with eager joins) for one entity shape.
struct Projection {
    columns: Vec<String>,
    from: String,
}

impl Projection {
    fn of(descriptor: &'static EntityDescriptor, root_alias: &str) -> Result<Self, QueryError> {
        let mut projection = Self {
            columns: Vec::new(),
            from: format!("{} AS {root_alias}", descriptor.table()),
        };
        projection.collect(descriptor, root_alias, "", 0, descriptor.name())?;
        Ok(projection)
    }

    fn collect(
        &mut self,
        descriptor: &'static EntityDescriptor,
        alias: &str,
        prefix: &str,
        depth: usize,
        root: &'static str,
    ) -> Result<(), QueryError> {
        if depth > MAX_RELATION_DEPTH {
            return Err(QueryError::RelationDepthExceeded {
                entity: root,
                max: MAX_RELATION_DEPTH,
            });
        }

        for field in std::iter::once(descriptor.id_field()).chain(descriptor.fields()) {
            self.columns.push(format!(
                "{alias}.{} AS \"{}\"",
                field.column,
                column_alias(prefix, field.name)
            ));
        }

        for relation in descriptor.relations() {
            let target = relation.target;
            let target_alias = table_alias(alias, relation.name);
            self.from.push_str(&format!(
                " INNER JOIN {} AS {target_alias} ON {target_alias}.{} = {alias}.{}",
                target.table(),
                target.id_field().column,
                relation.join_column
            ));
            self.collect(
                target,
                &target_alias,
                &nested_prefix(prefix, relation.name),
                depth + 1,
                root,
            )?;
        }

        Ok(())
    }

    fn select_sql(&self) -> String {
        format!("SELECT {} FROM {}", self.columns.join(", "), self.from)
    }
}

fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn to_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative row count {value}")))
}

fn numeric_from_storage(stored: i128, target: &ResolvedPath) -> RepoResult<Decimal> {
    let scale = match target.field_type() {
        FieldType::Integer => 0,
        FieldType::Decimal { scale } => scale,
        FieldType::Text => {
            return Err(RepoError::InvalidData(format!(
                "`{}` is not numeric",
                target.path()
            )))
        }
    };
    Decimal::try_from_i128_with_scale(stored, scale).map_err(|err| {
        RepoError::InvalidData(format!(
            "`{}` value {stored} does not fit a decimal: {err}",
            target.path()
        ))
    })
}

/// Mean of stored values. Decimal fields are rounded half away from zero to
/// their scale; integer fields keep the exact quotient.
fn average(sum: i128, count: u64, target: &ResolvedPath) -> RepoResult<Decimal> {
    let total = numeric_from_storage(sum, target)?;
    let mean = total
        .checked_div(Decimal::from(count))
        .ok_or_else(|| RepoError::InvalidData(format!("average of {count} rows overflows")))?;

    match target.field_type() {
        FieldType::Decimal { scale } => {
            Ok(mean.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero))
        }
        _ => Ok(mean.normalize()),
    }
}

fn group_key(row: &Row<'_>, target: &ResolvedPath) -> RepoResult<FieldValue> {
    let key = match target.field_type() {
        FieldType::Integer => FieldValue::Integer(row.get("group_key")?),
        FieldType::Text => FieldValue::Text(row.get("group_key")?),
        FieldType::Decimal { scale } => {
            let minor: i64 = row.get("group_key")?;
            FieldValue::Decimal(decimal_from_minor(minor, scale).map_err(RepoError::InvalidData)?)
        }
    };
    Ok(key)
}

fn observe<E: Entity, T>(
    op: &'static str,
    run: impl FnOnce() -> RepoResult<T>,
    rows: impl FnOnce(&T) -> u64,
) -> RepoResult<T> {
    let started_at = Instant::now();
    let entity = E::descriptor().name();
    let result = run();

    match &result {
        Ok(value) => debug!(
            "event=query module=query status=ok op={op} entity={entity} rows={} duration_ms={}",
            rows(value),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=query module=query status=error op={op} entity={entity} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::{Projection, ROOT_ALIAS};
    use crate::model::descriptor::{
        EntityDescriptor, FieldDescriptor, RelationDescriptor, MAX_RELATION_DEPTH,
    };
    use crate::model::employee::EMPLOYEE_DESCRIPTOR;
    use crate::model::value::FieldType;
    use crate::query::QueryError;

    static CATEGORY: EntityDescriptor = EntityDescriptor::new(
        "category",
        "categories",
        FieldDescriptor::new("id", "id", FieldType::Integer),
        &[],
        &[RelationDescriptor::new("parent", "parent_id", &CATEGORY)],
    );

    #[test]
    fn projection_joins_relations_with_prefixed_aliases() {
        let projection = Projection::of(&EMPLOYEE_DESCRIPTOR, ROOT_ALIAS).unwrap();
        assert!(projection
            .columns
            .contains(&"t0_branch.town AS \"branch__town\"".to_string()));
        assert!(projection.from.ends_with(
            "INNER JOIN branches AS t0_branch ON t0_branch.id = t0.branch_id"
        ));
    }

    #[test]
    fn unbounded_relation_chain_exceeds_depth() {
        let error = match Projection::of(&CATEGORY, ROOT_ALIAS) {
            Ok(_) => panic!("self-referencing projection must not resolve"),
            Err(error) => error,
        };
        assert_eq!(
            error,
            QueryError::RelationDepthExceeded {
                entity: "category",
                max: MAX_RELATION_DEPTH,
            }
        );
    }
}
