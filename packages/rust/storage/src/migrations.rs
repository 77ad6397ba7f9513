//! SQL migration definitions for the seoenrich page tables.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: pages, qc_pages",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Input page table, rewritten as a whole at the end of each enrich run
CREATE TABLE IF NOT EXISTS pages (
    position         INTEGER PRIMARY KEY,
    id               TEXT NOT NULL,
    url              TEXT NOT NULL,
    title            TEXT NOT NULL DEFAULT '',
    seo_title        TEXT NOT NULL DEFAULT '',
    meta_description TEXT NOT NULL DEFAULT '',
    processed        INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);

-- Narrow table written by the repair and finalize passes
CREATE TABLE IF NOT EXISTS qc_pages (
    position         INTEGER PRIMARY KEY,
    url              TEXT NOT NULL,
    title            TEXT NOT NULL DEFAULT '',
    seo_title        TEXT NOT NULL DEFAULT '',
    meta_description TEXT NOT NULL DEFAULT ''
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Daily generative call accounting",
            sql: r#"
CREATE TABLE IF NOT EXISTS api_usage (
    day   TEXT PRIMARY KEY,
    calls INTEGER NOT NULL DEFAULT 0
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
