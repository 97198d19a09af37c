mod common;

use common::{branches_db, company_db, count_rows};
use datarepo_core::{
    AggregateKind, Branch, BranchRepository, CompiledQuery, Direction, Employee, FieldPath,
    FieldValue, Operator, PageRequest, QueryError, QuerySpec, RepoError, Repository, SortSpec,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn revenue_query(operator: Operator) -> CompiledQuery<Branch> {
    CompiledQuery::compile(&QuerySpec::new().filter("revenue", operator)).unwrap()
}

fn names(branches: &[Branch]) -> Vec<&str> {
    branches.iter().map(|branch| branch.name.as_str()).collect()
}

#[test]
fn unknown_field_is_rejected_at_compile_time() {
    let err = CompiledQuery::<Branch>::compile(&QuerySpec::new().filter("city", Operator::Equals))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::InvalidFieldPath {
            entity: "branch",
            path: "city".to_string(),
            segment: "city".to_string()
        }
    );
}

#[test]
fn unknown_sort_field_is_rejected_before_any_query() {
    let conn = branches_db();
    let repo = BranchRepository::try_new(&conn).unwrap();

    let err = repo.find_all_sorted(&SortSpec::by("size")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::InvalidFieldPath { .. })
    ));
}

#[test]
fn wrong_value_count_is_rejected() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let query = revenue_query(Operator::Equals);

    let err = repo.find_by(&query, &[]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::ParameterCount {
            expected: 1,
            actual: 0
        })
    ));
}

#[test]
fn text_value_for_decimal_field_is_rejected() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let query = revenue_query(Operator::Equals);

    let err = repo
        .find_by(&query, &[FieldValue::from("lots")])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::InvalidValue { .. })
    ));
}

#[test]
fn integer_value_widens_into_decimal_field() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);

    let found = repo
        .find_by(&revenue_query(Operator::Equals), &[FieldValue::Integer(2000)])
        .unwrap();
    assert_eq!(names(&found), vec!["Bravo"]);
}

#[test]
fn excess_precision_bounds_round_to_the_exact_side() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);

    let at_least = repo
        .find_by(
            &revenue_query(Operator::GreaterThanOrEqual),
            &[FieldValue::Decimal(dec!(1999.995))],
        )
        .unwrap();
    assert_eq!(names(&at_least), vec!["Bravo", "Charly"]);

    let below = repo
        .find_by(
            &revenue_query(Operator::LessThan),
            &[FieldValue::Decimal(dec!(2000.001))],
        )
        .unwrap();
    assert_eq!(names(&below), vec!["Alfa", "Bravo"]);

    let above = repo
        .find_by(
            &revenue_query(Operator::GreaterThan),
            &[FieldValue::Decimal(dec!(1999.999))],
        )
        .unwrap();
    assert_eq!(names(&above), vec!["Bravo", "Charly"]);
}

#[test]
fn equality_with_excess_precision_is_an_error() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);

    let err = repo
        .find_by(
            &revenue_query(Operator::Equals),
            &[FieldValue::Decimal(dec!(2000.001))],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::InvalidValue { .. })
    ));
}

#[test]
fn saving_excess_precision_is_rejected() {
    let conn = branches_db();
    let repo = BranchRepository::try_new(&conn).unwrap();

    let mut delta = Branch::new("Delta", "Bruges", dec!(10.005));
    let err = repo.save(&mut delta).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::InvalidValue { .. })
    ));
    assert_eq!(count_rows(&conn, "branches"), 3);
}

#[test]
fn not_equals_and_sorted_query() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let query = CompiledQuery::compile(
        &QuerySpec::new()
            .filter("town", Operator::NotEquals)
            .order_by("revenue", Direction::Descending),
    )
    .unwrap();

    let found = repo.find_by(&query, &[FieldValue::from("Antwerp")]).unwrap();
    assert_eq!(names(&found), vec!["Charly", "Bravo"]);
}

#[test]
fn sum_min_max_over_filtered_rows() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let revenue = FieldPath::<Branch>::compile("revenue").unwrap();
    let in_town =
        CompiledQuery::compile(&QuerySpec::new().filter("town", Operator::Equals)).unwrap();
    let brussels = [FieldValue::from("Brussels")];

    let aggregate = |kind| {
        repo.aggregate_by(&in_town, &brussels, kind, &revenue)
            .unwrap()
            .into_scalar()
    };
    assert_eq!(aggregate(AggregateKind::Sum), Some(dec!(5000)));
    assert_eq!(aggregate(AggregateKind::Min), Some(dec!(2000)));
    assert_eq!(aggregate(AggregateKind::Max), Some(dec!(3000)));
    assert_eq!(aggregate(AggregateKind::Average), Some(dec!(2500)));
}

#[test]
fn average_rounds_half_away_from_zero_to_field_scale() {
    let conn = open_empty();
    let repo = BranchRepository::try_new(&conn).unwrap();
    for (name, revenue) in [("A", dec!(0.01)), ("B", dec!(0.01)), ("C", dec!(0.00)), ("D", dec!(0.00))] {
        repo.save(&mut Branch::new(name, "Ghent", revenue)).unwrap();
    }

    // 0.02 / 4 = 0.005
    assert_eq!(repo.find_average_revenue().unwrap(), Some(dec!(0.01)));
}

#[test]
fn sum_and_average_of_large_revenues_do_not_overflow() {
    let conn = open_empty();
    let repo = BranchRepository::try_new(&conn).unwrap();
    let minor = i64::MAX / 2 + 1;
    let revenue = Decimal::new(minor, 2);
    repo.save(&mut Branch::new("Big", "Antwerp", revenue)).unwrap();
    repo.save(&mut Branch::new("Bigger", "Antwerp", revenue)).unwrap();

    assert_eq!(repo.find_average_revenue().unwrap(), Some(revenue));

    let sum = Repository::<Branch>::new(&conn)
        .aggregate_by(
            &CompiledQuery::all(),
            &[],
            AggregateKind::Sum,
            &FieldPath::compile("revenue").unwrap(),
        )
        .unwrap()
        .into_scalar();
    let expected = Decimal::from_i128_with_scale(i128::from(minor) * 2, 2);
    assert_eq!(sum, Some(expected));
}

#[test]
fn sum_of_no_rows_is_none() {
    let conn = open_empty();
    let repo = Repository::<Branch>::new(&conn);

    let sum = repo
        .aggregate_by(
            &CompiledQuery::all(),
            &[],
            AggregateKind::Sum,
            &FieldPath::compile("revenue").unwrap(),
        )
        .unwrap()
        .into_scalar();
    assert_eq!(sum, None);
}

#[test]
fn numeric_aggregate_over_text_field_is_rejected() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let town = FieldPath::<Branch>::compile("town").unwrap();

    let err = repo
        .aggregate_by(&CompiledQuery::all(), &[], AggregateKind::Average, &town)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::UnsupportedAggregate { .. })
    ));
}

#[test]
fn max_group_respects_filter() {
    let conn = branches_db();
    let repo = Repository::<Branch>::new(&conn);
    let revenue = FieldPath::<Branch>::compile("revenue").unwrap();
    let in_town =
        CompiledQuery::compile(&QuerySpec::new().filter("town", Operator::Equals)).unwrap();

    let top = repo
        .aggregate_by(
            &in_town,
            &[FieldValue::from("Antwerp")],
            AggregateKind::MaxGroup,
            &revenue,
        )
        .unwrap()
        .into_entities();
    assert_eq!(names(&top), vec!["Alfa"]);
}

#[test]
fn sorting_by_relation_field() {
    let conn = company_db();
    let repo = Repository::<Employee>::new(&conn);

    let employees = repo
        .find_all_sorted(
            &SortSpec::by("branch.town").then("first_name", Direction::Ascending),
        )
        .unwrap();
    let first_names = employees
        .iter()
        .map(|employee| employee.first_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(first_names, vec!["Lucky", "Jack", "Joe"]);
}

#[test]
fn filtered_paging_counts_only_matches() {
    let conn = company_db();
    let repo = Repository::<Employee>::new(&conn);
    let query = CompiledQuery::compile(
        &QuerySpec::new()
            .filter("last_name", Operator::Equals)
            .order_by("first_name", Direction::Ascending),
    )
    .unwrap();

    let page = repo
        .find_page_by(&query, &[FieldValue::from("Dalton")], PageRequest::of(0, 1).unwrap())
        .unwrap();
    assert_eq!(page.total_elements(), 2);
    assert_eq!(page.content()[0].first_name, "Jack");
    assert!(page.has_next());
}

#[test]
fn zero_page_size_is_rejected() {
    assert!(matches!(
        PageRequest::of(0, 0),
        Err(QueryError::InvalidPageRequest(_))
    ));
}

#[test]
fn duplicate_name_is_a_persistence_error() {
    let conn = branches_db();
    let repo = BranchRepository::try_new(&conn).unwrap();

    let mut twin = Branch::new("Alfa", "Bruges", dec!(5));
    let err = repo.save(&mut twin).unwrap_err();
    assert!(matches!(err, RepoError::Persistence { entity: "branch", .. }));
    assert!(twin.id.is_none());
}

#[test]
fn writes_inside_rolled_back_transaction_disappear() {
    let conn = branches_db();
    {
        let tx = conn.unchecked_transaction().unwrap();
        let repo = BranchRepository::try_new(&tx).unwrap();
        repo.save(&mut Branch::new("Delta", "Bruges", dec!(10)))
            .unwrap();
        assert_eq!(repo.count().unwrap(), 4);
    }

    let repo = BranchRepository::try_new(&conn).unwrap();
    assert_eq!(repo.count().unwrap(), 3);
}

#[test]
fn writes_inside_committed_transaction_persist() {
    let conn = branches_db();
    let tx = conn.unchecked_transaction().unwrap();
    {
        let repo = BranchRepository::try_new(&tx).unwrap();
        repo.save(&mut Branch::new("Delta", "Bruges", dec!(10)))
            .unwrap();
    }
    tx.commit().unwrap();

    let repo = BranchRepository::try_new(&conn).unwrap();
    assert_eq!(repo.count().unwrap(), 4);
}

fn open_empty() -> rusqlite::Connection {
    datarepo_core::open_db_in_memory().unwrap()
}
