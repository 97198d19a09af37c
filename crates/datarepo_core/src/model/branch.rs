//! Branch entity.
//!
//! # Invariants
//! - `name` is unique across branches (enforced by the store).
//! - `revenue` is stored with two fraction digits.

use crate::model::descriptor::{EntityDescriptor, FieldDescriptor};
use crate::model::entity::{Entity, EntityId, EntityRow};
use crate::model::value::{FieldType, FieldValue};
use crate::repo::RepoResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub static BRANCH_DESCRIPTOR: EntityDescriptor = EntityDescriptor::new(
    "branch",
    "branches",
    FieldDescriptor::new("id", "id", FieldType::Integer),
    &[
        FieldDescriptor::new("name", "name", FieldType::Text),
        FieldDescriptor::new("town", "town", FieldType::Text),
        FieldDescriptor::new("revenue", "revenue", FieldType::Decimal { scale: 2 }),
    ],
    &[],
);

/// A company branch with its yearly revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Option<EntityId>,
    pub name: String,
    pub town: String,
    pub revenue: Decimal,
}

impl Branch {
    /// Creates an unsaved branch.
    pub fn new(name: impl Into<String>, town: impl Into<String>, revenue: Decimal) -> Self {
        Self {
            id: None,
            name: name.into(),
            town: town.into(),
            revenue,
        }
    }
}

impl Entity for Branch {
    fn descriptor() -> &'static EntityDescriptor {
        &BRANCH_DESCRIPTOR
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn values(&self) -> RepoResult<Vec<(&'static str, FieldValue)>> {
        Ok(vec![
            ("name", FieldValue::from(self.name.as_str())),
            ("town", FieldValue::from(self.town.as_str())),
            ("revenue", FieldValue::Decimal(self.revenue)),
        ])
    }

    fn from_row(row: &EntityRow<'_, '_>) -> RepoResult<Self> {
        Ok(Self {
            id: Some(row.id()?),
            name: row.text("name")?,
            town: row.text("town")?,
            revenue: row.decimal("revenue")?,
        })
    }
}
