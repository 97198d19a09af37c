//! Static entity-to-table mapping metadata.
//!
//! # Responsibility
//! - Map entity field names (used in query and sort specs) to columns.
//! - Declare many-to-one relations used for filtering and eager loading.
//!
//! # Invariants
//! - Descriptors are `static` values and never change after startup.
//! - Relation graphs are acyclic; traversal depth is capped at
//!   [`MAX_RELATION_DEPTH`].

use crate::model::value::FieldType;
use crate::query::QueryError;

/// Maximum number of relation hops joined for one entity shape.
pub const MAX_RELATION_DEPTH: usize = 4;

/// One persisted field of an entity.
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub column: &'static str,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, column: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column,
            field_type,
        }
    }
}

/// Required many-to-one link to another entity shape.
#[derive(Debug)]
pub struct RelationDescriptor {
    pub name: &'static str,
    /// Foreign key column on the owning table.
    pub join_column: &'static str,
    pub target: &'static EntityDescriptor,
}

impl RelationDescriptor {
    pub const fn new(
        name: &'static str,
        join_column: &'static str,
        target: &'static EntityDescriptor,
    ) -> Self {
        Self {
            name,
            join_column,
            target,
        }
    }
}

/// Immutable mapping between one entity shape and its table.
#[derive(Debug)]
pub struct EntityDescriptor {
    name: &'static str,
    table: &'static str,
    id: FieldDescriptor,
    fields: &'static [FieldDescriptor],
    relations: &'static [RelationDescriptor],
}

impl EntityDescriptor {
    pub const fn new(
        name: &'static str,
        table: &'static str,
        id: FieldDescriptor,
        fields: &'static [FieldDescriptor],
        relations: &'static [RelationDescriptor],
    ) -> Self {
        Self {
            name,
            table,
            id,
            fields,
            relations,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn id_field(&self) -> &FieldDescriptor {
        &self.id
    }

    /// Non-key fields in declaration order.
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    pub fn relations(&self) -> &'static [RelationDescriptor] {
        self.relations
    }

    /// Looks up a field (including the primary key) by name.
    pub fn field(&self, name: &str) -> Result<&FieldDescriptor, QueryError> {
        if self.id.name == name {
            return Ok(&self.id);
        }
        self.fields
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| QueryError::UnknownField {
                entity: self.name,
                field: name.to_string(),
            })
    }

    /// Looks up a relation by name.
    pub fn relation(&self, name: &str) -> Result<&'static RelationDescriptor, QueryError> {
        self.relations
            .iter()
            .find(|relation| relation.name == name)
            .ok_or_else(|| QueryError::UnknownRelation {
                entity: self.name,
                relation: name.to_string(),
            })
    }
}

/// Result-set alias of a field column below a relation prefix.
pub(crate) fn column_alias(prefix: &str, field: &str) -> String {
    format!("{prefix}{field}")
}

/// Prefix for columns of a related entity.
pub(crate) fn nested_prefix(prefix: &str, relation: &str) -> String {
    format!("{prefix}{relation}__")
}

/// SQL table alias of a joined relation.
pub(crate) fn table_alias(parent_alias: &str, relation: &str) -> String {
    format!("{parent_alias}_{relation}")
}
