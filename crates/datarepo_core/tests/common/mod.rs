//! Shared fixtures for repository integration tests.
#![allow(dead_code)]

use datarepo_core::db::open_db_in_memory;
use rusqlite::Connection;

/// Revenues are stored in hundredths.
pub const INSERT_BRANCHES: &str = "
    INSERT INTO branches (name, town, revenue) VALUES ('Alfa', 'Antwerp', 100000);
    INSERT INTO branches (name, town, revenue) VALUES ('Bravo', 'Brussels', 200000);
    INSERT INTO branches (name, town, revenue) VALUES ('Charly', 'Brussels', 300000);
";

pub const INSERT_EMPLOYEES: &str = "
    INSERT INTO employees (first_name, last_name, branch_id)
        VALUES ('Joe', 'Dalton', (SELECT id FROM branches WHERE name = 'Bravo'));
    INSERT INTO employees (first_name, last_name, branch_id)
        VALUES ('Jack', 'Dalton', (SELECT id FROM branches WHERE name = 'Charly'));
    INSERT INTO employees (first_name, last_name, branch_id)
        VALUES ('Lucky', 'Luke', (SELECT id FROM branches WHERE name = 'Alfa'));
";

pub fn branches_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(INSERT_BRANCHES).unwrap();
    conn
}

pub fn company_db() -> Connection {
    let conn = branches_db();
    conn.execute_batch(INSERT_EMPLOYEES).unwrap();
    conn
}

pub fn id_of_branch(conn: &Connection, name: &str) -> i64 {
    conn.query_row("SELECT id FROM branches WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> u64 {
    count_rows_where(conn, table, "1 = 1")
}

pub fn count_rows_where(conn: &Connection, table: &str, condition: &str) -> u64 {
    let count: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {condition}"),
            [],
            |row| row.get(0),
        )
        .unwrap();
    count as u64
}
