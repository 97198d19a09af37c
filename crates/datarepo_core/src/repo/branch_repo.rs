//! Branch repository with its derived finders.
//!
//! # Invariants
//! - Query shapes are compiled once per process, on first construction.
//! - Generic CRUD is reachable through `Deref` to [`Repository`].

use crate::model::branch::Branch;
use crate::model::value::FieldValue;
use crate::query::{
    AggregateKind, CompiledQuery, Direction, FieldPath, Operator, QueryError, QuerySpec,
};
use crate::repo::repository::Repository;
use crate::repo::RepoResult;
use once_cell::sync::OnceCell;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::ops::Deref;

static BRANCH_QUERIES: OnceCell<BranchQueries> = OnceCell::new();

struct BranchQueries {
    all: CompiledQuery<Branch>,
    by_town: CompiledQuery<Branch>,
    by_town_order_by_name: CompiledQuery<Branch>,
    revenue_at_least: CompiledQuery<Branch>,
    revenue: FieldPath<Branch>,
}

impl BranchQueries {
    fn compile() -> Result<Self, QueryError> {
        Ok(Self {
            all: CompiledQuery::all(),
            by_town: CompiledQuery::compile(&QuerySpec::new().filter("town", Operator::Equals))?,
            by_town_order_by_name: CompiledQuery::compile(
                &QuerySpec::new()
                    .filter("town", Operator::Equals)
                    .order_by("name", Direction::Ascending),
            )?,
            revenue_at_least: CompiledQuery::compile(
                &QuerySpec::new().filter("revenue", Operator::GreaterThanOrEqual),
            )?,
            revenue: FieldPath::compile("revenue")?,
        })
    }
}

/// SQLite-backed branch repository.
pub struct BranchRepository<'conn> {
    repo: Repository<'conn, Branch>,
    queries: &'static BranchQueries,
}

impl<'conn> BranchRepository<'conn> {
    /// Binds the repository to `conn`, compiling query shapes on first use.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let queries = BRANCH_QUERIES.get_or_try_init(BranchQueries::compile)?;
        Ok(Self {
            repo: Repository::new(conn),
            queries,
        })
    }

    pub fn find_by_town(&self, town: &str) -> RepoResult<Vec<Branch>> {
        self.repo
            .find_by(&self.queries.by_town, &[FieldValue::from(town)])
    }

    pub fn find_by_town_order_by_name(&self, town: &str) -> RepoResult<Vec<Branch>> {
        self.repo
            .find_by(&self.queries.by_town_order_by_name, &[FieldValue::from(town)])
    }

    pub fn count_by_town(&self, town: &str) -> RepoResult<u64> {
        self.repo
            .count_by(&self.queries.by_town, &[FieldValue::from(town)])
    }

    pub fn find_by_revenue_greater_than_equal(&self, revenue: Decimal) -> RepoResult<Vec<Branch>> {
        self.repo.find_by(
            &self.queries.revenue_at_least,
            &[FieldValue::Decimal(revenue)],
        )
    }

    /// Mean revenue over all branches, `None` when there are none.
    pub fn find_average_revenue(&self) -> RepoResult<Option<Decimal>> {
        self.repo
            .aggregate_by(
                &self.queries.all,
                &[],
                AggregateKind::Average,
                &self.queries.revenue,
            )
            .map(|value| value.into_scalar())
    }

    /// Every branch tied for the highest revenue.
    pub fn find_with_highest_revenue(&self) -> RepoResult<Vec<Branch>> {
        self.repo
            .aggregate_by(
                &self.queries.all,
                &[],
                AggregateKind::MaxGroup,
                &self.queries.revenue,
            )
            .map(|value| value.into_entities())
    }
}

impl<'conn> Deref for BranchRepository<'conn> {
    type Target = Repository<'conn, Branch>;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}
