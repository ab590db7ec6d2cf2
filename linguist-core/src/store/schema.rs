/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Full SQL schema for the linguist `SQLite` database.
///
/// Timestamps are integer milliseconds since the Unix epoch so that
/// last-writer-wins comparisons happen in SQL.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS linguist_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One current result per entity
CREATE TABLE IF NOT EXISTS entity_results (
    entity_ref TEXT PRIMARY KEY,
    computed_at INTEGER NOT NULL,
    unreadable_files INTEGER NOT NULL DEFAULT 0,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_results_computed_at ON entity_results(computed_at);

-- Named leases coordinating ticks across instances
CREATE TABLE IF NOT EXISTS leases (
    name TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
";
