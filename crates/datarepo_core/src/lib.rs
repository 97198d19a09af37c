//! Typed repository engine over SQLite.
//! Entities declare their shape once; repositories derive CRUD, filtered
//! finders, paging and aggregates from that shape.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::branch::{Branch, BRANCH_DESCRIPTOR};
pub use model::descriptor::{
    EntityDescriptor, FieldDescriptor, RelationDescriptor, MAX_RELATION_DEPTH,
};
pub use model::employee::{Employee, EMPLOYEE_DESCRIPTOR};
pub use model::entity::{Entity, EntityId, EntityRow};
pub use model::value::{FieldType, FieldValue};
pub use query::{
    AggregateKind, AggregateValue, CompiledQuery, Direction, FieldPath, GroupCount, Operator,
    Page, PageRequest, QueryError, QuerySpec, SortOrder, SortSpec,
};
pub use repo::branch_repo::BranchRepository;
pub use repo::employee_repo::EmployeeRepository;
pub use repo::repository::Repository;
pub use repo::{RepoError, RepoResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
