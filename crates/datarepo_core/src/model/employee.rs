//! Employee entity, linked to exactly one branch.

use crate::model::branch::{Branch, BRANCH_DESCRIPTOR};
use crate::model::descriptor::{EntityDescriptor, FieldDescriptor, RelationDescriptor};
use crate::model::entity::{Entity, EntityId, EntityRow};
use crate::model::value::{FieldType, FieldValue};
use crate::repo::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};

pub static EMPLOYEE_DESCRIPTOR: EntityDescriptor = EntityDescriptor::new(
    "employee",
    "employees",
    FieldDescriptor::new("id", "id", FieldType::Integer),
    &[
        FieldDescriptor::new("first_name", "first_name", FieldType::Text),
        FieldDescriptor::new("last_name", "last_name", FieldType::Text),
    ],
    &[RelationDescriptor::new("branch", "branch_id", &BRANCH_DESCRIPTOR)],
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    /// Always fully loaded; never a deferred reference.
    pub branch: Branch,
}

impl Employee {
    /// Creates an unsaved employee working at `branch`.
    ///
    /// `branch` must be persisted before the employee is saved.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, branch: Branch) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            branch,
        }
    }
}

impl Entity for Employee {
    fn descriptor() -> &'static EntityDescriptor {
        &EMPLOYEE_DESCRIPTOR
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn values(&self) -> RepoResult<Vec<(&'static str, FieldValue)>> {
        let branch_id = self.branch.id.ok_or(RepoError::UnsavedRelation {
            entity: EMPLOYEE_DESCRIPTOR.name(),
            relation: "branch",
        })?;

        Ok(vec![
            ("first_name", FieldValue::from(self.first_name.as_str())),
            ("last_name", FieldValue::from(self.last_name.as_str())),
            ("branch", FieldValue::Integer(branch_id)),
        ])
    }

    fn from_row(row: &EntityRow<'_, '_>) -> RepoResult<Self> {
        Ok(Self {
            id: Some(row.id()?),
            first_name: row.text("first_name")?,
            last_name: row.text("last_name")?,
            branch: row.related("branch")?,
        })
    }
}
