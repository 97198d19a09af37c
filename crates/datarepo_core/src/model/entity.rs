//! Entity contract and descriptor-aware row access.
//!
//! # Responsibility
//! - Define what a persistable entity must provide to the engine.
//! - Decode result rows, including eagerly joined relations, by field name.
//!
//! # Invariants
//! - Identity is `None` until the store assigns it on first save.
//! - Related entities are fully materialized from the same row.

use crate::model::descriptor::{column_alias, nested_prefix, EntityDescriptor, FieldDescriptor};
use crate::model::value::{decimal_from_minor, FieldType, FieldValue};
use crate::repo::{RepoError, RepoResult};
use rusqlite::Row;
use rust_decimal::Decimal;

/// Store-assigned primary key.
pub type EntityId = i64;

/// A record shape the engine can persist and materialize.
pub trait Entity: Sized {
    /// Static mapping for this shape.
    fn descriptor() -> &'static EntityDescriptor;

    fn id(&self) -> Option<EntityId>;

    /// Called once by the repository after the store assigned a key.
    fn set_id(&mut self, id: EntityId);

    /// Persisted values keyed by field name, or by relation name carrying the
    /// target id. The primary key is never included.
    fn values(&self) -> RepoResult<Vec<(&'static str, FieldValue)>>;

    fn from_row(row: &EntityRow<'_, '_>) -> RepoResult<Self>;
}

/// One result row viewed through an entity descriptor.
pub struct EntityRow<'row, 'stmt> {
    row: &'row Row<'stmt>,
    descriptor: &'static EntityDescriptor,
    prefix: String,
}

impl<'row, 'stmt> EntityRow<'row, 'stmt> {
    pub(crate) fn root(row: &'row Row<'stmt>, descriptor: &'static EntityDescriptor) -> Self {
        Self {
            row,
            descriptor,
            prefix: String::new(),
        }
    }

    pub fn id(&self) -> RepoResult<EntityId> {
        let alias = column_alias(&self.prefix, self.descriptor.id_field().name);
        Ok(self.row.get(alias.as_str())?)
    }

    pub fn text(&self, field: &str) -> RepoResult<String> {
        let descriptor = self.typed_field(field, |field_type| field_type == FieldType::Text)?;
        let alias = column_alias(&self.prefix, descriptor.name);
        Ok(self.row.get(alias.as_str())?)
    }

    pub fn integer(&self, field: &str) -> RepoResult<i64> {
        let descriptor =
            self.typed_field(field, |field_type| field_type == FieldType::Integer)?;
        let alias = column_alias(&self.prefix, descriptor.name);
        Ok(self.row.get(alias.as_str())?)
    }

    pub fn decimal(&self, field: &str) -> RepoResult<Decimal> {
        let descriptor = self.typed_field(field, |field_type| {
            matches!(field_type, FieldType::Decimal { .. })
        })?;
        let FieldType::Decimal { scale } = descriptor.field_type else {
            return Err(self.type_mismatch(descriptor));
        };
        let alias = column_alias(&self.prefix, descriptor.name);
        let minor: i64 = self.row.get(alias.as_str())?;
        decimal_from_minor(minor, scale).map_err(|message| {
            RepoError::InvalidData(format!(
                "{}.{}: {message}",
                self.descriptor.table(),
                descriptor.column
            ))
        })
    }

    /// Materializes the entity linked through `relation`.
    pub fn related<T: Entity>(&self, relation: &str) -> RepoResult<T> {
        let link = self.descriptor.relation(relation)?;
        let nested = EntityRow {
            row: self.row,
            descriptor: link.target,
            prefix: nested_prefix(&self.prefix, link.name),
        };
        T::from_row(&nested)
    }

    fn typed_field(
        &self,
        field: &str,
        accepts: impl Fn(FieldType) -> bool,
    ) -> RepoResult<&'static FieldDescriptor> {
        let descriptor: &'static EntityDescriptor = self.descriptor;
        let found = descriptor.field(field)?;
        if !accepts(found.field_type) {
            return Err(self.type_mismatch(found));
        }
        Ok(found)
    }

    fn type_mismatch(&self, field: &FieldDescriptor) -> RepoError {
        RepoError::InvalidData(format!(
            "{}.{} is declared as {}",
            self.descriptor.name(),
            field.name,
            field.field_type
        ))
    }
}
