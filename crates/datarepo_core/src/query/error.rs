use crate::model::value::FieldType;
use crate::query::aggregate::AggregateKind;
use crate::query::spec::Operator;
use thiserror::Error;

/// Query validation failures.
///
/// All variants are raised before any statement reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown field `{field}` on {entity}")]
    UnknownField { entity: &'static str, field: String },

    #[error("unknown relation `{relation}` on {entity}")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },

    #[error("invalid field path `{path}` on {entity}: segment `{segment}` does not resolve")]
    InvalidFieldPath {
        entity: &'static str,
        path: String,
        segment: String,
    },

    #[error("operator {operator} is not supported for {field_type} field `{path}`")]
    UnsupportedOperator {
        path: String,
        operator: Operator,
        field_type: FieldType,
    },

    #[error("aggregate {kind} is not supported for {field_type} field `{path}`")]
    UnsupportedAggregate {
        path: String,
        kind: AggregateKind,
        field_type: FieldType,
    },

    #[error("invalid value for `{path}`: {message}")]
    InvalidValue { path: String, message: String },

    #[error("query expects {expected} values, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("invalid page request: {0}")]
    InvalidPageRequest(String),

    #[error("relation depth of {entity} exceeds {max}")]
    RelationDepthExceeded { entity: &'static str, max: usize },
}
