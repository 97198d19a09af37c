//! Employee repository with branch traversal, prefix search and grouping.

use crate::model::employee::Employee;
use crate::model::value::FieldValue;
use crate::query::{
    CompiledQuery, FieldPath, GroupCount, Operator, Page, PageRequest, QueryError, QuerySpec,
};
use crate::repo::repository::Repository;
use crate::repo::RepoResult;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use std::ops::Deref;

static EMPLOYEE_QUERIES: OnceCell<EmployeeQueries> = OnceCell::new();

struct EmployeeQueries {
    all: CompiledQuery<Employee>,
    by_branch_town: CompiledQuery<Employee>,
    first_name_prefix: CompiledQuery<Employee>,
    last_name: FieldPath<Employee>,
}

impl EmployeeQueries {
    fn compile() -> Result<Self, QueryError> {
        Ok(Self {
            all: CompiledQuery::all(),
            by_branch_town: CompiledQuery::compile(
                &QuerySpec::new().filter("branch.town", Operator::Equals),
            )?,
            first_name_prefix: CompiledQuery::compile(
                &QuerySpec::new().filter("first_name", Operator::StartsWith),
            )?,
            last_name: FieldPath::compile("last_name")?,
        })
    }
}

/// SQLite-backed employee repository. Every returned employee carries its
/// fully loaded branch.
pub struct EmployeeRepository<'conn> {
    repo: Repository<'conn, Employee>,
    queries: &'static EmployeeQueries,
}

impl<'conn> EmployeeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let queries = EMPLOYEE_QUERIES.get_or_try_init(EmployeeQueries::compile)?;
        Ok(Self {
            repo: Repository::new(conn),
            queries,
        })
    }

    /// Employees whose branch is located in `town`.
    pub fn find_by_branch_town(&self, town: &str) -> RepoResult<Vec<Employee>> {
        self.repo
            .find_by(&self.queries.by_branch_town, &[FieldValue::from(town)])
    }

    /// Case-sensitive first-name prefix match.
    pub fn find_by_first_name_starting_with(&self, prefix: &str) -> RepoResult<Vec<Employee>> {
        self.repo
            .find_by(&self.queries.first_name_prefix, &[FieldValue::from(prefix)])
    }

    /// One page of all employees in natural order.
    pub fn find_all_paged(&self, page: PageRequest) -> RepoResult<Page<Employee>> {
        self.repo.find_page_by(&self.queries.all, &[], page)
    }

    /// Number of employees per last name, ordered by last name.
    pub fn count_per_last_name(&self) -> RepoResult<Vec<GroupCount>> {
        self.repo
            .count_grouped_by(&self.queries.all, &[], &self.queries.last_name)
    }
}

impl<'conn> Deref for EmployeeRepository<'conn> {
    type Target = Repository<'conn, Employee>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}
