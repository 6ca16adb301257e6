//! Declarative schema for the local key-value store.
//!
//! Tables, columns, and per-column defaults are described data-first so
//! [`super::migrations`] can diff a live database against this layout and
//! repair it without ever dropping a row.

/// One column of a table, including the default used when the column is
/// added to a pre-existing (legacy) row via `ALTER TABLE ... ADD COLUMN`.
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    /// SQL literal used as `DEFAULT <default_sql>` when backfilling.
    pub default_sql: &'static str,
}

/// One table: its full `CREATE TABLE IF NOT EXISTS` statement (used for a
/// fresh store) plus the column list (used to detect/repair drift on an
/// existing store).
pub struct TableSpec {
    pub name: &'static str,
    pub create_sql: &'static str,
    pub columns: &'static [ColumnSpec],
}

/// Current schema version. Bumped on breaking changes; `repair_schema`
/// stamps this into the `schema_version` table after a successful repair.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

macro_rules! col {
    ($name:expr, $ty:expr, $default:expr) => {
        ColumnSpec { name: $name, sql_type: $ty, default_sql: $default }
    };
}

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "schema_version",
        create_sql: "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        )",
        columns: &[col!("version", "INTEGER", "0")],
    },
    TableSpec {
        name: "auth",
        create_sql: "CREATE TABLE IF NOT EXISTS auth (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        columns: &[col!("value", "TEXT", "''")],
    },
    TableSpec {
        name: "defaults",
        create_sql: "CREATE TABLE IF NOT EXISTS defaults (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        columns: &[col!("value", "TEXT", "''")],
    },
    TableSpec {
        name: "org_regions",
        create_sql: "CREATE TABLE IF NOT EXISTS org_regions (
            org_slug TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        columns: &[
            col!("url", "TEXT", "''"),
            col!("updated_at", "INTEGER", "0"),
        ],
    },
    TableSpec {
        name: "project_aliases",
        create_sql: "CREATE TABLE IF NOT EXISTS project_aliases (
            alias TEXT PRIMARY KEY,
            org_slug TEXT NOT NULL,
            project_slug TEXT NOT NULL,
            fingerprint TEXT
        )",
        columns: &[
            col!("org_slug", "TEXT", "''"),
            col!("project_slug", "TEXT", "''"),
            col!("fingerprint", "TEXT", "NULL"),
        ],
    },
    TableSpec {
        name: "project_cache",
        create_sql: "CREATE TABLE IF NOT EXISTS project_cache (
            identifier TEXT PRIMARY KEY,
            project_root TEXT NOT NULL,
            dir_mtime INTEGER NOT NULL,
            org_slug TEXT NOT NULL,
            project_slug TEXT NOT NULL,
            resolved_at INTEGER NOT NULL
        )",
        columns: &[
            col!("project_root", "TEXT", "''"),
            col!("dir_mtime", "INTEGER", "0"),
            col!("org_slug", "TEXT", "''"),
            col!("project_slug", "TEXT", "''"),
            col!("resolved_at", "INTEGER", "0"),
        ],
    },
    TableSpec {
        name: "dsn_cache",
        create_sql: "CREATE TABLE IF NOT EXISTS dsn_cache (
            public_key TEXT PRIMARY KEY,
            org_slug TEXT NOT NULL,
            project_slug TEXT NOT NULL,
            cached_at INTEGER NOT NULL
        )",
        columns: &[
            col!("org_slug", "TEXT", "''"),
            col!("project_slug", "TEXT", "''"),
            col!("cached_at", "INTEGER", "0"),
        ],
    },
    TableSpec {
        name: "project_root_cache",
        create_sql: "CREATE TABLE IF NOT EXISTS project_root_cache (
            project_root TEXT PRIMARY KEY,
            basename TEXT NOT NULL,
            dir_mtime INTEGER NOT NULL,
            resolved_at INTEGER NOT NULL,
            org_slug TEXT,
            project_slug TEXT
        )",
        columns: &[
            col!("basename", "TEXT", "''"),
            col!("dir_mtime", "INTEGER", "0"),
            col!("resolved_at", "INTEGER", "0"),
            col!("org_slug", "TEXT", "NULL"),
            col!("project_slug", "TEXT", "NULL"),
        ],
    },
    TableSpec {
        name: "metadata",
        create_sql: "CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        columns: &[col!("value", "TEXT", "''")],
    },
    // The remaining tables back commands outside this crate's core scope
    // (whoami/instance info, transaction-level aliasing) but are declared
    // here so `get_schema_issues`/`repair_schema` cover the full table set
    // named in the persisted-state layout, and so an online repair never
    // has to special-case "tables core doesn't use yet".
    TableSpec {
        name: "user_info",
        create_sql: "CREATE TABLE IF NOT EXISTS user_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        columns: &[col!("value", "TEXT", "''")],
    },
    TableSpec {
        name: "instance_info",
        create_sql: "CREATE TABLE IF NOT EXISTS instance_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        columns: &[col!("value", "TEXT", "''")],
    },
    TableSpec {
        name: "transaction_aliases",
        create_sql: "CREATE TABLE IF NOT EXISTS transaction_aliases (
            alias TEXT PRIMARY KEY,
            org_slug TEXT NOT NULL,
            project_slug TEXT NOT NULL,
            transaction_name TEXT NOT NULL,
            fingerprint TEXT
        )",
        columns: &[
            col!("org_slug", "TEXT", "''"),
            col!("project_slug", "TEXT", "''"),
            col!("transaction_name", "TEXT", "''"),
            col!("fingerprint", "TEXT", "NULL"),
        ],
    },
];
