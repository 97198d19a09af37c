//! Generic repository façade for one entity shape.
//!
//! # Responsibility
//! - Provide CRUD (`count`, `find_by_id`, `find_all`, `save`, `delete_by_id`).
//! - Run compiled derived queries through the query executor.
//!
//! # Invariants
//! - `save` inserts when the identity is absent and updates when present;
//!   nothing else decides.
//! - `delete_by_id` on a missing key fails with `NotFound`.

use crate::model::descriptor::EntityDescriptor;
use crate::model::entity::{Entity, EntityId};
use crate::model::value::{encode, FieldValue, Rounding};
use crate::query::{
    AggregateKind, AggregateValue, CompiledQuery, FieldPath, Filter, GroupCount, Page,
    PageRequest, QueryError, QueryExecutor, Sort, SortSpec,
};
use crate::repo::{map_write_error, RepoError, RepoResult};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;

/// Repository bound to one connection (or transaction) and one entity shape.
pub struct Repository<'conn, E> {
    conn: &'conn Connection,
    executor: QueryExecutor<'conn>,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> Repository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            executor: QueryExecutor::new(conn),
            _entity: PhantomData,
        }
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.executor.count(&Filter::<E>::all())
    }

    pub fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        self.executor.by_id(id)
    }

    pub fn exists_by_id(&self, id: EntityId) -> RepoResult<bool> {
        let descriptor = E::descriptor();
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                descriptor.table(),
                descriptor.id_field().column
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    /// All rows in natural (insertion) order.
    pub fn find_all(&self) -> RepoResult<Vec<E>> {
        self.executor.fetch_all(&Filter::all(), &Sort::unsorted())
    }

    pub fn find_all_sorted(&self, sort: &SortSpec) -> RepoResult<Vec<E>> {
        let sort = Sort::compile(sort)?;
        self.executor.fetch_all(&Filter::all(), &sort)
    }

    pub fn find_page(&self, page: PageRequest, sort: &SortSpec) -> RepoResult<Page<E>> {
        let sort = Sort::compile(sort)?;
        self.executor.fetch_page(&Filter::all(), &sort, page)
    }

    /// Returns the existing subset of `ids`; missing keys are skipped.
    pub fn find_all_by_id(&self, ids: impl IntoIterator<Item = EntityId>) -> RepoResult<Vec<E>> {
        self.executor.by_ids(ids)
    }

    /// Inserts `entity` when it has no identity, otherwise updates it.
    ///
    /// Returns the (possibly newly assigned) primary key.
    ///
    /// # Errors
    /// - `Persistence` on a store constraint violation.
    /// - `NotFound` when updating a key that has no row.
    pub fn save(&self, entity: &mut E) -> RepoResult<EntityId> {
        let descriptor = E::descriptor();
        let columns = write_columns(descriptor, entity.values()?)?;

        match entity.id() {
            None => {
                let id = self.insert(descriptor, columns)?;
                entity.set_id(id);
                info!(
                    "event=save module=repo status=ok mode=insert entity={} id={id}",
                    descriptor.name()
                );
                Ok(id)
            }
            Some(id) => {
                self.update(descriptor, id, columns)?;
                info!(
                    "event=save module=repo status=ok mode=update entity={} id={id}",
                    descriptor.name()
                );
                Ok(id)
            }
        }
    }

    /// Removes the row with `id`; immediately visible to later calls.
    ///
    /// # Errors
    /// - `NotFound` when no row has that key.
    /// - `Persistence` when another row still references it.
    pub fn delete_by_id(&self, id: EntityId) -> RepoResult<()> {
        let descriptor = E::descriptor();
        let changed = self
            .conn
            .execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    descriptor.table(),
                    descriptor.id_field().column
                ),
                [id],
            )
            .map_err(|err| map_write_error(descriptor.name(), err))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: descriptor.name(),
                id,
            });
        }

        info!(
            "event=delete module=repo status=ok entity={} id={id}",
            descriptor.name()
        );
        Ok(())
    }

    /// Runs a compiled query with one value per clause.
    pub fn find_by(&self, query: &CompiledQuery<E>, values: &[FieldValue]) -> RepoResult<Vec<E>> {
        let filter = query.bind(values)?;
        self.executor.fetch_all(&filter, query.sort())
    }

    pub fn count_by(&self, query: &CompiledQuery<E>, values: &[FieldValue]) -> RepoResult<u64> {
        let filter = query.bind(values)?;
        self.executor.count(&filter)
    }

    pub fn find_page_by(
        &self,
        query: &CompiledQuery<E>,
        values: &[FieldValue],
        page: PageRequest,
    ) -> RepoResult<Page<E>> {
        let filter = query.bind(values)?;
        self.executor.fetch_page(&filter, query.sort(), page)
    }

    pub fn aggregate_by(
        &self,
        query: &CompiledQuery<E>,
        values: &[FieldValue],
        kind: AggregateKind,
        field: &FieldPath<E>,
    ) -> RepoResult<AggregateValue<E>> {
        let filter = query.bind(values)?;
        self.executor.fetch_scalar_aggregate(&filter, kind, field)
    }

    pub fn count_grouped_by(
        &self,
        query: &CompiledQuery<E>,
        values: &[FieldValue],
        field: &FieldPath<E>,
    ) -> RepoResult<Vec<GroupCount>> {
        let filter = query.bind(values)?;
        self.executor.count_grouped(&filter, field)
    }

    fn insert(
        &self,
        descriptor: &'static EntityDescriptor,
        columns: Vec<(&'static str, Value)>,
    ) -> RepoResult<EntityId> {
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", descriptor.table())
        } else {
            let names = columns.iter().map(|(column, _)| *column).collect::<Vec<_>>();
            let placeholders = vec!["?"; names.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                descriptor.table(),
                names.join(", ")
            )
        };

        self.conn
            .execute(&sql, params_from_iter(columns.into_iter().map(|(_, value)| value)))
            .map_err(|err| map_write_error(descriptor.name(), err))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(
        &self,
        descriptor: &'static EntityDescriptor,
        id: EntityId,
        columns: Vec<(&'static str, Value)>,
    ) -> RepoResult<()> {
        let not_found = RepoError::NotFound {
            entity: descriptor.name(),
            id,
        };
        if columns.is_empty() {
            return if self.exists_by_id(id)? {
                Ok(())
            } else {
                Err(not_found)
            };
        }

        let assignments = columns
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?",
            descriptor.table(),
            descriptor.id_field().column
        );
        let values = columns
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Integer(id)));

        let changed = self
            .conn
            .execute(&sql, params_from_iter(values))
            .map_err(|err| map_write_error(descriptor.name(), err))?;
        if changed == 0 {
            return Err(not_found);
        }
        Ok(())
    }
}

/// Maps entity values (by field or relation name) to storage columns.
fn write_columns(
    descriptor: &'static EntityDescriptor,
    values: Vec<(&'static str, FieldValue)>,
) -> RepoResult<Vec<(&'static str, Value)>> {
    values
        .into_iter()
        .map(|(name, value)| -> RepoResult<(&'static str, Value)> {
            let invalid = |message: String| QueryError::InvalidValue {
                path: name.to_string(),
                message,
            };

            if name == descriptor.id_field().name {
                return Err(invalid("primary key is assigned by the store".to_string()).into());
            }
            if let Ok(field) = descriptor.field(name) {
                let encoded = encode(field.field_type, &value, Rounding::Exact).map_err(invalid)?;
                return Ok((field.column, encoded));
            }

            let relation = descriptor.relation(name).map_err(|_| QueryError::UnknownField {
                entity: descriptor.name(),
                field: name.to_string(),
            })?;
            let encoded = encode(relation.target.id_field().field_type, &value, Rounding::Exact)
                .map_err(invalid)?;
            Ok((relation.join_column, encoded))
        })
        .collect()
}
