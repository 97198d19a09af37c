//! Aggregate kinds and their result shapes.

use crate::model::value::FieldValue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// Mean over matching rows; decimal fields keep their declared scale.
    Average,
    Sum,
    Min,
    Max,
    /// Every entity whose value equals the maximum among matching rows.
    MaxGroup,
}

impl AggregateKind {
    /// Scalar kinds need a numeric field; `MaxGroup` works on any field.
    pub fn requires_numeric(self) -> bool {
        !matches!(self, Self::MaxGroup)
    }
}

impl Display for AggregateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Average => "average",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::MaxGroup => "max_group",
        };
        f.write_str(name)
    }
}

/// Outcome of an aggregate query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateValue<E> {
    /// `None` when no row matched.
    Scalar(Option<Decimal>),
    /// Empty when no row matched.
    Entities(Vec<E>),
}

impl<E> AggregateValue<E> {
    /// Returns the scalar, or `None` for entity results.
    pub fn into_scalar(self) -> Option<Decimal> {
        match self {
            Self::Scalar(value) => value,
            Self::Entities(_) => None,
        }
    }

    /// Returns the entities, or an empty list for scalar results.
    pub fn into_entities(self) -> Vec<E> {
        match self {
            Self::Entities(entities) => entities,
            Self::Scalar(_) => Vec::new(),
        }
    }
}

/// Row count for one distinct value of the grouping field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: FieldValue,
    pub count: u64,
}
