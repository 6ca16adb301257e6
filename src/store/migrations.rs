//! Online schema repair: `get_schema_issues`, `repair_schema`, `init_schema`.
//!
//! Repair never drops data: missing tables are created fresh, missing
//! columns are added with the default declared in [`super::schema`], and
//! anything that can't be added (a type conflict on an existing column,
//! say) is reported in `failed` rather than attempted destructively.

use super::schema::{CURRENT_SCHEMA_VERSION, TABLES};
use rusqlite::Connection;
use tracing::{info, warn};

/// One gap between the live database and the declared schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    MissingTable(String),
    MissingColumn(String, String),
}

/// Outcome of a repair attempt: what was fixed, and what couldn't be.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub fixed: Vec<String>,
    pub failed: Vec<String>,
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
}

fn column_names(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let sql = format!("SELECT name FROM pragma_table_info('{table}')");
    conn.prepare(&sql)?
        .query_map([], |row| row.get(0))?
        .collect()
}

use rusqlite::OptionalExtension;

/// Diff the live database against the declared schema.
pub fn get_schema_issues(conn: &Connection) -> rusqlite::Result<Vec<SchemaIssue>> {
    let mut issues = Vec::new();
    for table in TABLES {
        if !table_exists(conn, table.name)? {
            issues.push(SchemaIssue::MissingTable(table.name.to_string()));
            continue;
        }
        let existing = column_names(conn, table.name)?;
        for column in table.columns {
            if !existing.iter().any(|c| c == column.name) {
                issues.push(SchemaIssue::MissingColumn(
                    table.name.to_string(),
                    column.name.to_string(),
                ));
            }
        }
    }
    Ok(issues)
}

/// Create every table from scratch. Idempotent: every `CREATE TABLE` is
/// `IF NOT EXISTS`.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    for table in TABLES {
        conn.execute_batch(table.create_sql)?;
    }
    stamp_version(conn)?;
    Ok(())
}

/// Repair a live database: create missing tables, `ALTER`-add missing
/// columns with their declared defaults. Never drops or rewrites existing
/// rows. Returns a report of what was fixed and what failed.
pub fn repair_schema(conn: &Connection) -> rusqlite::Result<RepairReport> {
    let mut report = RepairReport::default();

    for table in TABLES {
        if !table_exists(conn, table.name)? {
            match conn.execute_batch(table.create_sql) {
                Ok(()) => {
                    info!(table = table.name, "created missing table");
                    report.fixed.push(format!("table:{}", table.name));
                }
                Err(e) => {
                    warn!(table = table.name, error = %e, "failed to create table");
                    report.failed.push(format!("table:{}: {e}", table.name));
                }
            }
            continue;
        }

        let existing = column_names(conn, table.name)?;
        for column in table.columns {
            if existing.iter().any(|c| c == column.name) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {} DEFAULT {}",
                table.name, column.name, column.sql_type, column.default_sql
            );
            match conn.execute_batch(&sql) {
                Ok(()) => {
                    info!(table = table.name, column = column.name, "added missing column");
                    report.fixed.push(format!("column:{}.{}", table.name, column.name));
                }
                Err(e) => {
                    warn!(
                        table = table.name,
                        column = column.name,
                        error = %e,
                        "failed to add column; reads will treat it as absent"
                    );
                    report
                        .failed
                        .push(format!("column:{}.{}: {e}", table.name, column.name));
                }
            }
        }
    }

    stamp_version(conn)?;
    Ok(report)
}

fn stamp_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_version (id, version) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}
