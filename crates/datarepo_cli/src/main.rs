//! CLI entry point.
//!
//! # Responsibility
//! - Load configuration, open the database and dispatch one command.
//! - Print results to stdout and errors to stderr, exiting non-zero on failure.

mod args;

use args::{Cli, Command};
use clap::Parser;
use datarepo_core::{
    init_logging, open_db, open_db_in_memory, Branch, BranchRepository, CompiledQuery,
    ConfigError, DbError, Direction, Employee, EmployeeRepository, EngineConfig, FieldValue,
    LoggingError, Operator, PageRequest, QuerySpec, RepoError, SortSpec,
};
use log::info;
use rusqlite::Connection;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    if let Some(dir) = &config.log_dir {
        init_logging(&config.log_level, &dir.to_string_lossy())?;
    }

    if let Command::Ping = cli.command {
        println!("datarepo_core ping={}", datarepo_core::ping());
        println!("datarepo_core version={}", datarepo_core::core_version());
        return Ok(());
    }

    let conn = match &config.database_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    match cli.command {
        Command::Ping => Ok(()),
        Command::Seed => seed(&conn),
        Command::Branches { town, sort } => list_branches(&conn, town.as_deref(), sort.as_deref()),
        Command::Stats => stats(&conn),
        Command::Employees { page, size } => {
            list_employees(&conn, page, size.unwrap_or(config.default_page_size))
        }
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig, ConfigError> {
    if cli.config.exists() {
        EngineConfig::load(&cli.config)
    } else {
        Ok(EngineConfig::default())
    }
}

fn seed(conn: &Connection) -> Result<(), CliError> {
    let tx = conn.unchecked_transaction().map_err(DbError::from)?;
    {
        let branches = BranchRepository::try_new(&tx)?;
        let employees = EmployeeRepository::try_new(&tx)?;

        let mut alfa = Branch::new("Alfa", "Antwerp", Decimal::new(1000, 0));
        let mut bravo = Branch::new("Bravo", "Brussels", Decimal::new(2000, 0));
        let mut charly = Branch::new("Charly", "Brussels", Decimal::new(3000, 0));
        for branch in [&mut alfa, &mut bravo, &mut charly] {
            branches.save(branch)?;
        }

        let mut staff = [
            Employee::new("Joe", "Dalton", bravo.clone()),
            Employee::new("Jack", "Dalton", charly.clone()),
            Employee::new("Lucky", "Luke", alfa.clone()),
        ];
        for employee in staff.iter_mut() {
            employees.save(employee)?;
        }
    }
    tx.commit().map_err(DbError::from)?;

    info!("event=seed module=cli status=ok branches=3 employees=3");
    println!("seeded 3 branches and 3 employees");
    Ok(())
}

fn list_branches(conn: &Connection, town: Option<&str>, sort: Option<&str>) -> Result<(), CliError> {
    let repo = BranchRepository::try_new(conn)?;
    let sort = parse_sort(sort);
    let branches = match town {
        Some(town) if sort.orders().is_empty() => repo.find_by_town(town)?,
        Some(town) => {
            let mut spec = QuerySpec::new().filter("town", Operator::Equals);
            for order in sort.orders() {
                spec = spec.order_by(order.path.clone(), order.direction);
            }
            let query = CompiledQuery::compile(&spec).map_err(RepoError::from)?;
            repo.find_by(&query, &[FieldValue::from(town)])?
        }
        None => repo.find_all_sorted(&sort)?,
    };

    for branch in &branches {
        print_branch(branch);
    }
    Ok(())
}

fn stats(conn: &Connection) -> Result<(), CliError> {
    let branches = BranchRepository::try_new(conn)?;
    let employees = EmployeeRepository::try_new(conn)?;

    println!("branches={}", branches.count()?);
    match branches.find_average_revenue()? {
        Some(average) => println!("average_revenue={average}"),
        None => println!("average_revenue=none"),
    }
    for branch in branches.find_with_highest_revenue()? {
        print!("highest: ");
        print_branch(&branch);
    }

    println!("employees={}", employees.count()?);
    for group in employees.count_per_last_name()? {
        println!("last_name={} count={}", group.key, group.count);
    }
    Ok(())
}

fn list_employees(conn: &Connection, index: u32, size: u32) -> Result<(), CliError> {
    let repo = EmployeeRepository::try_new(conn)?;
    let request = PageRequest::of(index, size).map_err(RepoError::from)?;
    let page = repo.find_all_paged(request)?;

    for employee in page.content() {
        println!(
            "{}\t{} {}\t{}",
            employee.id.unwrap_or_default(),
            employee.first_name,
            employee.last_name,
            employee.branch.name
        );
    }
    println!(
        "page={}/{} total={} previous={} next={}",
        page.index(),
        page.total_pages(),
        page.total_elements(),
        page.has_previous(),
        page.has_next()
    );
    Ok(())
}

/// `revenue` sorts ascending, `-revenue` descending.
fn parse_sort(raw: Option<&str>) -> SortSpec {
    match raw.map(str::trim) {
        None | Some("") => SortSpec::unsorted(),
        Some(field) => match field.strip_prefix('-') {
            Some(field) => SortSpec::unsorted().then(field, Direction::Descending),
            None => SortSpec::by(field),
        },
    }
}

fn print_branch(branch: &Branch) {
    println!(
        "{}\t{}\t{}\t{}",
        branch.id.unwrap_or_default(),
        branch.name,
        branch.town,
        branch.revenue
    );
}
