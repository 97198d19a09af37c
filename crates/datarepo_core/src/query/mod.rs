//! Derived-query compilation and execution.
//!
//! # Responsibility
//! - Turn caller-built `QuerySpec`s into validated, reusable compiled queries.
//! - Execute filters with sorting, pagination and aggregation.
//!
//! # Invariants
//! - Malformed paths and operator/type mismatches fail before any
//!   statement is prepared.
//! - An empty filter matches every row.

pub mod aggregate;
mod error;
pub mod executor;
pub mod page;
pub mod predicate;
pub mod spec;

pub use aggregate::{AggregateKind, AggregateValue, GroupCount};
pub use error::QueryError;
pub use executor::QueryExecutor;
pub use page::Page;
pub use predicate::{CompiledQuery, FieldPath, Filter, Sort};
pub use spec::{Clause, Direction, Operator, PageRequest, QuerySpec, SortOrder, SortSpec};
